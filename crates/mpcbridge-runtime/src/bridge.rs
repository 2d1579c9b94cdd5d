//! [`SolutionBridge`] – hands planner solutions over to the control loop.
//!
//! Two entry points drive the bridge:
//!
//! 1. **Ingest** – a new [`TrajectorySolution`] arrives.  The bridge keeps two
//!    slots, *current* and *previous*; the incoming message becomes current
//!    and the old current becomes previous.  The state `[q; v]` and input
//!    `[a; wrenches]` are rebuilt from the **previous** slot and pushed into
//!    the [`ResamplingEngine`], so the engine always works on the last fully
//!    settled solution rather than the one that just landed.
//! 2. **Tick** – once per control period.  The bridge pulls the resampled
//!    state and torques, publishes a latched diagnostic, converts the result
//!    into named-joint references, subtracts the torque offsets and dispatches
//!    everything to the [`RobotInterface`] in one commit.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──ingest_first──▶ Ready ──ingest_subsequent──▶ Ready
//! ```
//!
//! The first ingest freezes the sizing (joint ordering, vector lengths,
//! contact frames).  Every later message must match it.  A rejected message
//! leaves the Ready state, the slots and the engine exactly as they were.

use std::mem;

use mpcbridge_hal::RobotInterface;
use mpcbridge_kernel::{CommandVerifier, SolutionWatchdog, Transition};
use mpcbridge_middleware::{EventBus, Topic};
use mpcbridge_resampler::ResamplingEngine;
use mpcbridge_types::{
    BridgeError, Event, EventPayload, JointCommand, JointNameMap, ResampledJointState,
    TrajectorySolution, VIRTUAL_JOINT_NAMES, VectorKind, WRENCH_SIZE,
};
use nalgebra::DVector;
use tracing::{debug, error, info, instrument, warn};

use crate::config::BridgeConfig;
use crate::horizon_guard::HorizonGuard;

const SOURCE: &str = "mpcbridge-runtime::bridge";

/// Entries of the floating-base quaternion inside `q`.
const BASE_QUATERNION: std::ops::Range<usize> = 3..7;

/// Accepted deviation of the floating-base quaternion norm from one.
const QUATERNION_NORM_TOLERANCE: f64 = 1.0e-3;

/// Dimensions frozen by the first ingested solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sizing {
    /// Virtual base joints followed by the planner's joint names.
    pub joint_names: Vec<String>,
    pub nq: usize,
    pub nv: usize,
    pub na: usize,
    /// Contact frames registered with the engine.
    pub frames: Vec<String>,
}

impl Sizing {
    fn from_first(solution: &TrajectorySolution) -> Self {
        let joint_names = VIRTUAL_JOINT_NAMES
            .iter()
            .map(|n| n.to_string())
            .chain(solution.joint_names.iter().cloned())
            .collect();
        Self {
            joint_names,
            nq: solution.q.len(),
            nv: solution.v.len(),
            na: solution.a.len(),
            frames: solution.force_names.clone(),
        }
    }

    pub fn state_len(&self) -> usize {
        self.nq + self.nv
    }

    pub fn input_len(&self) -> usize {
        self.na + WRENCH_SIZE * self.frames.len()
    }
}

/// Vectors derived from the previous slot.
#[derive(Debug, Clone)]
struct WorkingVectors {
    jerk: Option<DVector<f64>>,
    x: DVector<f64>,
    u: DVector<f64>,
}

impl WorkingVectors {
    fn assemble(solution: &TrajectorySolution, frame_count: usize) -> Self {
        let p = DVector::from_column_slice(&solution.q);
        let v = DVector::from_column_slice(&solution.v);
        let a = DVector::from_column_slice(&solution.a);
        let jerk = (!solution.j.is_empty()).then(|| DVector::from_column_slice(&solution.j));

        // Only translational contact forces are modeled; the rotational
        // block of each wrench stays zero.
        let mut f = DVector::zeros(WRENCH_SIZE * frame_count);
        for (i, force) in solution.f.iter().take(frame_count).enumerate() {
            let block = i * WRENCH_SIZE;
            f[block] = force.x;
            f[block + 1] = force.y;
            f[block + 2] = force.z;
        }

        let x = DVector::from_iterator(p.len() + v.len(), p.iter().chain(v.iter()).copied());
        let u = DVector::from_iterator(a.len() + f.len(), a.iter().chain(f.iter()).copied());
        Self { jerk, x, u }
    }
}

#[derive(Debug)]
struct Ready {
    sizing: Sizing,
    current: TrajectorySolution,
    previous: TrajectorySolution,
    vectors: WorkingVectors,
}

#[derive(Debug)]
enum Lifecycle {
    Uninitialized,
    Ready(Box<Ready>),
}

/// The handoff and resampling bridge.
///
/// The bridge owns the engine and the robot handle; wrap it in a single
/// mutex (see [`ControlLoop`][crate::control_loop::ControlLoop]) so that an
/// ingest and a tick never interleave.
///
/// # Example
///
/// ```rust
/// use mpcbridge_hal::SimRobot;
/// use mpcbridge_middleware::EventBus;
/// use mpcbridge_resampler::{FloatingBaseModel, IntegratingResampler};
/// use mpcbridge_runtime::{BridgeConfig, SolutionBridge};
/// use mpcbridge_types::TrajectorySolution;
///
/// let engine = IntegratingResampler::new(FloatingBaseModel::new(["knee"]));
/// let robot = SimRobot::new(["knee"]);
/// let mut bridge =
///     SolutionBridge::new(engine, robot, EventBus::default(), BridgeConfig::default())
///         .expect("default config is valid");
///
/// bridge
///     .ingest(TrajectorySolution {
///         joint_names: vec!["knee".into()],
///         q: vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.1],
///         v: vec![0.0; 7],
///         a: vec![0.0; 7],
///         ..Default::default()
///     })
///     .expect("consistent solution");
///
/// let command = bridge.tick().expect("ready bridge ticks");
/// assert!((command.position["knee"] - 0.1).abs() < 1e-9);
/// ```
pub struct SolutionBridge<E, R> {
    engine: E,
    robot: R,
    bus: EventBus,
    verifier: CommandVerifier,
    watchdog: SolutionWatchdog,
    horizon: HorizonGuard,
    torque_offset: JointNameMap,
    dt: f64,
    resample_on_tick: bool,
    lifecycle: Lifecycle,
    ingest_count: u64,
    tick_count: u64,
}

impl<E: ResamplingEngine, R: RobotInterface> SolutionBridge<E, R> {
    /// Build an uninitialized bridge.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Config`] when `config` fails validation.
    pub fn new(engine: E, robot: R, bus: EventBus, config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(Self {
            engine,
            robot,
            bus,
            verifier: CommandVerifier::with_defaults(&config.effort_limits),
            watchdog: SolutionWatchdog::new(config.planner_timeout()),
            horizon: HorizonGuard::new(config.mpc_dt),
            torque_offset: config.torque_offset.clone(),
            dt: config.dt(),
            resample_on_tick: config.resample_on_tick,
            lifecycle: Lifecycle::Uninitialized,
            ingest_count: 0,
            tick_count: 0,
        })
    }

    /// Replace the command verifier used before every dispatch.
    pub fn with_verifier(mut self, verifier: CommandVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    // ---------------------------------------------------------------------
    // Ingestion
    // ---------------------------------------------------------------------

    /// Ingest a planner solution, bootstrapping the bridge on the first call.
    pub fn ingest(&mut self, solution: TrajectorySolution) -> Result<(), BridgeError> {
        match self.lifecycle {
            Lifecycle::Uninitialized => self.ingest_first(solution),
            Lifecycle::Ready(_) => self.ingest_subsequent(solution),
        }
    }

    /// Bootstrap from the first solution: it fills both slots, freezes the
    /// sizing and registers the contact frames with the engine.
    ///
    /// # Errors
    ///
    /// [`BridgeError::AlreadyInitialized`] once the bridge is Ready;
    /// [`BridgeError::MalformedSolution`] or
    /// [`BridgeError::DimensionMismatch`] when the solution does not fit the
    /// engine's model.  On error the bridge stays Uninitialized.
    #[instrument(skip_all, fields(joints = solution.joint_names.len(), frames = solution.force_names.len()))]
    pub fn ingest_first(&mut self, solution: TrajectorySolution) -> Result<(), BridgeError> {
        if matches!(self.lifecycle, Lifecycle::Ready(_)) {
            return Err(BridgeError::AlreadyInitialized);
        }
        check_well_formed(&solution)?;
        if solution.v.len() != VIRTUAL_JOINT_NAMES.len() + solution.joint_names.len() {
            return Err(BridgeError::MalformedSolution(format!(
                "{} velocities do not cover {} virtual + {} named joints",
                solution.v.len(),
                VIRTUAL_JOINT_NAMES.len(),
                solution.joint_names.len()
            )));
        }

        let sizing = Sizing::from_first(&solution);
        check_len(VectorKind::State, self.engine.state_size(), sizing.state_len())?;
        check_len(
            VectorKind::Input,
            self.engine.nv() + WRENCH_SIZE * sizing.frames.len(),
            sizing.input_len(),
        )?;
        if self.engine.nq() == self.engine.nv() + 1 {
            check_base_quaternion(&solution)?;
        }

        let vectors = WorkingVectors::assemble(&solution, sizing.frames.len());
        let old_frames = self.engine.frames().to_vec();
        self.engine.set_frames(&sizing.frames);
        if let Err(e) = push_to_engine(&mut self.engine, &vectors) {
            self.engine.set_frames(&old_frames);
            return Err(e);
        }

        info!(
            joints = sizing.joint_names.len(),
            state_len = sizing.state_len(),
            input_len = sizing.input_len(),
            frames = ?sizing.frames,
            "bridge initialized from first solution"
        );
        self.lifecycle = Lifecycle::Ready(Box::new(Ready {
            sizing,
            current: solution.clone(),
            previous: solution,
            vectors,
        }));
        self.on_ingested();
        Ok(())
    }

    /// Shift *current* into *previous*, store `solution` as *current* and
    /// hand the previous slot to the engine.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Uninitialized`] before the first ingest; otherwise any
    /// disagreement with the frozen sizing.  On error nothing changes.
    #[instrument(skip_all, fields(ingest = self.ingest_count + 1))]
    pub fn ingest_subsequent(&mut self, solution: TrajectorySolution) -> Result<(), BridgeError> {
        let Lifecycle::Ready(ready) = &mut self.lifecycle else {
            return Err(BridgeError::Uninitialized);
        };
        check_well_formed(&solution)?;
        check_against_sizing(&ready.sizing, &solution)?;
        if self.engine.nq() == self.engine.nv() + 1 {
            check_base_quaternion(&solution)?;
        }

        // The current slot is about to become the previous one.
        let vectors = WorkingVectors::assemble(&ready.current, ready.sizing.frames.len());
        push_to_engine(&mut self.engine, &vectors)?;

        ready.previous = mem::replace(&mut ready.current, solution);
        ready.vectors = vectors;
        debug!("solution slots shifted");
        self.on_ingested();
        Ok(())
    }

    fn on_ingested(&mut self) {
        self.ingest_count += 1;
        self.horizon.reset();
        self.watchdog.heartbeat();
    }

    // ---------------------------------------------------------------------
    // Control tick
    // ---------------------------------------------------------------------

    /// Run one control period and dispatch exactly one full reference update.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Uninitialized`] before the first ingest. Engine,
    /// verification and sensing failures abort the tick before any reference
    /// is written to the robot.
    #[instrument(skip_all, fields(tick = self.tick_count + 1))]
    pub fn tick(&mut self) -> Result<JointCommand, BridgeError> {
        let Lifecycle::Ready(ready) = &self.lifecycle else {
            return Err(BridgeError::Uninitialized);
        };
        let sizing = &ready.sizing;

        self.robot.sense()?;
        // The robot's position reference is the last committed command.
        let last_command_q = self.engine.map_to_q(&self.robot.position_reference());

        if self.resample_on_tick {
            let step = self.horizon.admit(self.dt);
            if step.newly_exhausted {
                warn!(
                    horizon_s = self.horizon.elapsed(),
                    "no new solution within the planner period; holding last resampled state"
                );
            }
            if step.dt > 0.0 {
                self.engine.resample(step.dt)?;
            }
        }

        let x = self.engine.state();
        let tau = self.engine.tau();
        check_len(VectorKind::State, sizing.state_len(), x.len())?;
        check_len(VectorKind::Tau, sizing.joint_names.len(), tau.len())?;

        let p = x.rows(0, sizing.nq).clone_owned();
        let v = x.rows(sizing.nq, sizing.nv).clone_owned();
        let a = ready.vectors.u.rows(0, sizing.na).clone_owned();

        if last_command_q.len() == p.len() {
            debug!(
                reference_delta = (&last_command_q - &p).norm(),
                "resampled position vs last commanded reference"
            );
        }

        let diagnostic = ResampledJointState {
            position: p.as_slice().to_vec(),
            velocity: v.as_slice().to_vec(),
            effort: tau.as_slice().to_vec(),
        };
        self.bus.publish_latched(
            Topic::ResamplerOutput,
            Event::new(SOURCE, EventPayload::Resampled(diagnostic)),
        );

        let q_minimal = self.engine.minimal_q(&p)?;
        check_len(VectorKind::MinimalPosition, sizing.joint_names.len(), q_minimal.len())?;
        check_len(VectorKind::Velocity, sizing.joint_names.len(), v.len())?;
        check_len(VectorKind::Acceleration, sizing.joint_names.len(), a.len())?;

        let mut command = JointCommand {
            position: to_named(&sizing.joint_names, &q_minimal),
            velocity: to_named(&sizing.joint_names, &v),
            acceleration: to_named(&sizing.joint_names, &a),
            effort: to_named(&sizing.joint_names, &tau),
        };
        for (joint, effort) in command.effort.iter_mut() {
            *effort -= self.torque_offset.get(joint).copied().unwrap_or(0.0);
        }

        self.verifier.verify(&command)?;

        self.robot.set_position_reference(&command.position)?;
        self.robot.set_velocity_reference(&command.velocity)?;
        self.robot.set_effort_reference(&command.effort)?;
        self.robot.commit()?;

        self.tick_count += 1;
        Ok(command)
    }

    /// Replace the whole per-joint torque offset mapping; applies from the
    /// next tick.
    pub fn set_torque_offset(&mut self, offsets: JointNameMap) {
        debug!(joints = offsets.len(), "torque offsets replaced");
        self.torque_offset = offsets;
    }

    pub fn torque_offset(&self) -> &JointNameMap {
        &self.torque_offset
    }

    /// Report a planner fresh/stale transition since the last poll.
    pub fn poll_planner(&mut self) -> Option<Transition> {
        self.watchdog.poll()
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    pub fn is_ready(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Ready(_))
    }

    pub fn sizing(&self) -> Option<&Sizing> {
        self.ready().map(|r| &r.sizing)
    }

    pub fn current(&self) -> Option<&TrajectorySolution> {
        self.ready().map(|r| &r.current)
    }

    pub fn previous(&self) -> Option<&TrajectorySolution> {
        self.ready().map(|r| &r.previous)
    }

    /// State vector last pushed into the engine.
    pub fn state_vector(&self) -> Option<&DVector<f64>> {
        self.ready().map(|r| &r.vectors.x)
    }

    /// Input vector last pushed into the engine.
    pub fn input_vector(&self) -> Option<&DVector<f64>> {
        self.ready().map(|r| &r.vectors.u)
    }

    /// Jerk of the previous slot, when the planner provided one.
    pub fn jerk(&self) -> Option<&DVector<f64>> {
        self.ready().and_then(|r| r.vectors.jerk.as_ref())
    }

    pub fn ingest_count(&self) -> u64 {
        self.ingest_count
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn robot(&self) -> &R {
        &self.robot
    }

    pub fn robot_mut(&mut self) -> &mut R {
        &mut self.robot
    }

    fn ready(&self) -> Option<&Ready> {
        match &self.lifecycle {
            Lifecycle::Ready(ready) => Some(ready),
            Lifecycle::Uninitialized => None,
        }
    }
}

// -------------------------------------------------------------------------
// Validation helpers
// -------------------------------------------------------------------------

fn check_len(vector: VectorKind, expected: usize, actual: usize) -> Result<(), BridgeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(BridgeError::DimensionMismatch { vector, expected, actual })
    }
}

fn check_well_formed(solution: &TrajectorySolution) -> Result<(), BridgeError> {
    if solution.is_empty() {
        return Err(BridgeError::MalformedSolution("empty position vector".to_string()));
    }
    if solution.force_names.len() != solution.f.len() {
        return Err(BridgeError::MalformedSolution(format!(
            "{} force names but {} forces",
            solution.force_names.len(),
            solution.f.len()
        )));
    }
    if solution.v.len() != solution.a.len() {
        return Err(BridgeError::MalformedSolution(format!(
            "{} velocities but {} accelerations",
            solution.v.len(),
            solution.a.len()
        )));
    }
    if !solution.j.is_empty() && solution.j.len() != solution.a.len() {
        return Err(BridgeError::MalformedSolution(format!(
            "{} jerks but {} accelerations",
            solution.j.len(),
            solution.a.len()
        )));
    }
    Ok(())
}

fn check_against_sizing(sizing: &Sizing, solution: &TrajectorySolution) -> Result<(), BridgeError> {
    let planner_joints = &sizing.joint_names[VIRTUAL_JOINT_NAMES.len()..];
    if solution.joint_names != planner_joints {
        return Err(BridgeError::MalformedSolution(format!(
            "joint names changed: expected {planner_joints:?}, got {:?}",
            solution.joint_names
        )));
    }
    check_len(VectorKind::Position, sizing.nq, solution.q.len())?;
    check_len(VectorKind::Velocity, sizing.nv, solution.v.len())?;
    check_len(VectorKind::Acceleration, sizing.na, solution.a.len())?;
    if solution.force_names.len() != sizing.frames.len() {
        return Err(BridgeError::DimensionMismatch {
            vector: VectorKind::Input,
            expected: sizing.input_len(),
            actual: solution.a.len() + WRENCH_SIZE * solution.force_names.len(),
        });
    }
    if solution.force_names != sizing.frames {
        return Err(BridgeError::FrameMismatch {
            expected: sizing.frames.clone(),
            actual: solution.force_names.clone(),
        });
    }
    Ok(())
}

fn check_base_quaternion(solution: &TrajectorySolution) -> Result<(), BridgeError> {
    let Some(quat) = solution.q.get(BASE_QUATERNION) else {
        return Err(BridgeError::MalformedSolution(
            "position vector too short for a floating base".to_string(),
        ));
    };
    let norm = quat.iter().map(|c| c * c).sum::<f64>().sqrt();
    if (norm - 1.0).abs() > QUATERNION_NORM_TOLERANCE {
        return Err(BridgeError::MalformedSolution(format!(
            "floating-base quaternion norm is {norm}, expected 1"
        )));
    }
    Ok(())
}

/// Push state then input; restore the engine's previous state if the input
/// is refused so that nothing is half-committed.
fn push_to_engine<E: ResamplingEngine>(engine: &mut E, vectors: &WorkingVectors) -> Result<(), BridgeError> {
    check_len(VectorKind::State, engine.state_size(), vectors.x.len())?;
    check_len(VectorKind::Input, engine.input_size(), vectors.u.len())?;

    let prior_state = engine.state();
    engine.set_state(&vectors.x)?;
    if let Err(e) = engine.set_input(&vectors.u) {
        if let Err(restore) = engine.set_state(&prior_state) {
            error!(error = %restore, "failed to restore engine state after rejected input");
        }
        return Err(e);
    }
    Ok(())
}

fn to_named(names: &[String], values: &DVector<f64>) -> JointNameMap {
    names.iter().cloned().zip(values.iter().copied()).collect()
}
