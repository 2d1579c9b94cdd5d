//! In-process simulated robot for CI testing without physical hardware.
//!
//! [`SimRobot`] stages references exactly like a real driver, latches them on
//! [`commit`][RobotInterface::commit] and reports perfect tracking on the
//! next [`sense`][RobotInterface::sense].  Commit and sense counters let
//! tests assert how many full reference updates reached the "hardware".
//!
//! # Example
//!
//! ```rust
//! use mpcbridge_hal::{RobotInterface, SimRobot};
//! use mpcbridge_types::JointNameMap;
//!
//! let mut robot = SimRobot::new(["hip", "knee"]);
//! robot
//!     .set_position_reference(&JointNameMap::from([("knee".to_string(), 0.4)]))
//!     .expect("sim reference must be accepted");
//! robot.commit().expect("sim commit must succeed");
//! assert_eq!(robot.commit_count(), 1);
//! ```

use mpcbridge_types::{BridgeError, JointNameMap};
use tracing::debug;

use crate::robot::RobotInterface;

/// A simulated whole-body robot.
#[derive(Debug, Clone, Default)]
pub struct SimRobot {
    names: Vec<String>,
    staged_position: JointNameMap,
    staged_velocity: JointNameMap,
    staged_effort: JointNameMap,
    committed_position: JointNameMap,
    committed_velocity: JointNameMap,
    committed_effort: JointNameMap,
    measured_position: JointNameMap,
    measured_velocity: JointNameMap,
    commit_count: u64,
    sense_count: u64,
    fault: Option<String>,
}

impl SimRobot {
    /// Create a robot with the given actuated joints, all at zero.
    pub fn new<I, S>(joint_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = joint_names.into_iter().map(Into::into).collect();
        let zeros: JointNameMap = names.iter().map(|n| (n.clone(), 0.0)).collect();
        Self {
            staged_position: zeros.clone(),
            staged_velocity: zeros.clone(),
            staged_effort: zeros.clone(),
            measured_position: zeros.clone(),
            measured_velocity: zeros,
            names,
            ..Default::default()
        }
    }

    /// Make every subsequent `sense` and `commit` fail with `details` until
    /// cleared with `None`.
    pub fn inject_fault(&mut self, details: Option<String>) {
        self.fault = details;
    }

    /// Number of successful `commit` calls.
    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }

    /// Number of successful `sense` calls.
    pub fn sense_count(&self) -> u64 {
        self.sense_count
    }

    /// Position references latched by the last `commit`.
    pub fn committed_position(&self) -> &JointNameMap {
        &self.committed_position
    }

    /// Velocity references latched by the last `commit`.
    pub fn committed_velocity(&self) -> &JointNameMap {
        &self.committed_velocity
    }

    /// Effort references latched by the last `commit`.
    pub fn committed_effort(&self) -> &JointNameMap {
        &self.committed_effort
    }

    /// Joint positions read by the last `sense`.
    pub fn measured_position(&self) -> &JointNameMap {
        &self.measured_position
    }

    fn check_fault(&self) -> Result<(), BridgeError> {
        match &self.fault {
            Some(details) => Err(BridgeError::HardwareFault {
                component: "sim_robot".to_string(),
                details: details.clone(),
            }),
            None => Ok(()),
        }
    }

    fn stage(names: &[String], staged: &mut JointNameMap, reference: &JointNameMap) {
        for name in names {
            if let Some(value) = reference.get(name) {
                staged.insert(name.clone(), *value);
            }
        }
    }
}

impl RobotInterface for SimRobot {
    fn sense(&mut self) -> Result<(), BridgeError> {
        self.check_fault()?;
        self.measured_position = self.committed_position.clone();
        self.measured_velocity = self.committed_velocity.clone();
        for name in &self.names {
            self.measured_position.entry(name.clone()).or_insert(0.0);
            self.measured_velocity.entry(name.clone()).or_insert(0.0);
        }
        self.sense_count += 1;
        Ok(())
    }

    fn joint_names(&self) -> &[String] {
        &self.names
    }

    fn position_reference(&self) -> JointNameMap {
        self.staged_position.clone()
    }

    fn velocity_reference(&self) -> JointNameMap {
        self.staged_velocity.clone()
    }

    fn set_position_reference(&mut self, reference: &JointNameMap) -> Result<(), BridgeError> {
        Self::stage(&self.names, &mut self.staged_position, reference);
        Ok(())
    }

    fn set_velocity_reference(&mut self, reference: &JointNameMap) -> Result<(), BridgeError> {
        Self::stage(&self.names, &mut self.staged_velocity, reference);
        Ok(())
    }

    fn set_effort_reference(&mut self, reference: &JointNameMap) -> Result<(), BridgeError> {
        Self::stage(&self.names, &mut self.staged_effort, reference);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), BridgeError> {
        self.check_fault()?;
        self.committed_position = self.staged_position.clone();
        self.committed_velocity = self.staged_velocity.clone();
        self.committed_effort = self.staged_effort.clone();
        self.commit_count += 1;
        debug!(commit = self.commit_count, joints = self.names.len(), "sim robot moved");
        Ok(())
    }
}
