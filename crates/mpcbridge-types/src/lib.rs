use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Named virtual joints standing in for the six floating-base coordinates.
///
/// They are prepended to the planner's joint names so that every entry of a
/// minimal-coordinate vector has a name.
pub const VIRTUAL_JOINT_NAMES: [&str; 6] = [
    "VIRTUALJOINT_1",
    "VIRTUALJOINT_2",
    "VIRTUALJOINT_3",
    "VIRTUALJOINT_4",
    "VIRTUALJOINT_5",
    "VIRTUALJOINT_6",
];

/// Number of wrench entries packed per contact frame in the input vector.
pub const WRENCH_SIZE: usize = 6;

/// Mapping from joint name to a scalar value (position, velocity, effort, …).
pub type JointNameMap = HashMap<String, f64>;

/// A linear contact force expressed as a plain 3-vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Force3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Force3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// One whole-body planner output.
///
/// `q` carries the floating base as `[x y z qx qy qz qw]` followed by the
/// actuated joints; `v` and `a` are expressed in the tangent space (`nv`
/// entries). `j` is optional and may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySolution {
    pub joint_names: Vec<String>,
    pub q: Vec<f64>,
    pub v: Vec<f64>,
    pub a: Vec<f64>,
    #[serde(default)]
    pub j: Vec<f64>,
    #[serde(default)]
    pub force_names: Vec<String>,
    #[serde(default)]
    pub f: Vec<Force3>,
}

impl TrajectorySolution {
    /// `true` when the message carries no configuration at all.
    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }
}

/// Diagnostic snapshot of the resampled command, published once per tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResampledJointState {
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub effort: Vec<f64>,
}

/// Named-joint command produced by one control tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointCommand {
    pub position: JointNameMap,
    pub velocity: JointNameMap,
    pub acceleration: JointNameMap,
    pub effort: JointNameMap,
}

/// Unified event wrapper for the in-process event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "mpcbridge-runtime::control_loop"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A fresh planner solution.
    Solution(TrajectorySolution),
    /// The resampled command sent to the actuators on the last tick.
    Resampled(ResampledJointState),
    BridgeFault {
        component: String,
        code: u32,
        message: String,
    },
}

/// Which assembled vector a dimension check was performed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorKind {
    State,
    Input,
    Position,
    Velocity,
    Acceleration,
    Tau,
    MinimalPosition,
}

impl fmt::Display for VectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VectorKind::State => "state",
            VectorKind::Input => "input",
            VectorKind::Position => "position",
            VectorKind::Velocity => "velocity",
            VectorKind::Acceleration => "acceleration",
            VectorKind::Tau => "tau",
            VectorKind::MinimalPosition => "minimal position",
        };
        f.write_str(name)
    }
}

/// Error type shared by every crate in the workspace.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("wrong dimension of the {vector} vector! {actual} != {expected}")]
    DimensionMismatch {
        vector: VectorKind,
        expected: usize,
        actual: usize,
    },

    #[error("contact frames changed: expected {expected:?}, got {actual:?}")]
    FrameMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Malformed solution: {0}")]
    MalformedSolution(String),

    #[error("bridge has not ingested a solution yet")]
    Uninitialized,

    #[error("bridge is already initialized")]
    AlreadyInitialized,

    #[error("no planner solution for {age_ms} ms")]
    PlannerStale { age_ms: u64 },

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Command rejected by rule '{rule}': {details}")]
    CommandRejected { rule: String, details: String },

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Config Error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Numeric code carried by [`EventPayload::BridgeFault`] alerts.
    pub fn code(&self) -> u32 {
        match self {
            BridgeError::DimensionMismatch { .. } => 100,
            BridgeError::FrameMismatch { .. } => 101,
            BridgeError::MalformedSolution(_) => 102,
            BridgeError::Uninitialized => 200,
            BridgeError::AlreadyInitialized => 201,
            BridgeError::PlannerStale { .. } => 202,
            BridgeError::HardwareFault { .. } => 300,
            BridgeError::CommandRejected { .. } => 301,
            BridgeError::Channel(_) => 400,
            BridgeError::Config(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solution_deserializes_without_optional_fields() {
        let json = r#"{
            "joint_names": ["knee"],
            "q": [0, 0, 0, 0, 0, 0, 1, 0.1],
            "v": [0, 0, 0, 0, 0, 0, 0.2],
            "a": [0, 0, 0, 0, 0, 0, 0]
        }"#;
        let sol: TrajectorySolution = serde_json::from_str(json).unwrap();
        assert_eq!(sol.q.len(), 8);
        assert!(sol.j.is_empty());
        assert!(sol.force_names.is_empty());
        assert!(sol.f.is_empty());
        assert!(!sol.is_empty());
    }

    #[test]
    fn solution_with_forces_roundtrip() {
        let sol = TrajectorySolution {
            joint_names: vec!["hip".into(), "knee".into()],
            q: vec![0.0; 9],
            v: vec![0.0; 8],
            a: vec![0.0; 8],
            j: vec![],
            force_names: vec!["contact_1".into()],
            f: vec![Force3::new(1.0, 0.0, 9.81)],
        };
        let json = serde_json::to_string(&sol).unwrap();
        let back: TrajectorySolution = serde_json::from_str(&json).unwrap();
        assert_eq!(sol, back);
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "mpcbridge-runtime::bridge",
            EventPayload::Resampled(ResampledJointState {
                position: vec![1.0],
                velocity: vec![0.5],
                effort: vec![-2.0],
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(event.source, back.source);
    }

    #[test]
    fn dimension_mismatch_display_names_the_vector() {
        let err = BridgeError::DimensionMismatch {
            vector: VectorKind::State,
            expected: 15,
            actual: 16,
        };
        let msg = err.to_string();
        assert!(msg.contains("state"));
        assert!(msg.contains("16 != 15"));
    }

    #[test]
    fn error_codes_are_distinct_per_family() {
        assert_eq!(BridgeError::Uninitialized.code(), 200);
        assert_ne!(
            BridgeError::MalformedSolution(String::new()).code(),
            BridgeError::Config(String::new()).code()
        );
    }

    #[test]
    fn planner_staleness_is_not_a_channel_error() {
        let stale = BridgeError::PlannerStale { age_ms: 750 };
        assert_eq!(stale.code(), 202);
        assert_ne!(stale.code(), BridgeError::Channel(String::new()).code());
        assert_eq!(stale.to_string(), "no planner solution for 750 ms");
    }

    #[test]
    fn virtual_joint_names_cover_the_floating_base() {
        assert_eq!(VIRTUAL_JOINT_NAMES.len(), WRENCH_SIZE);
        assert_eq!(VIRTUAL_JOINT_NAMES[0], "VIRTUALJOINT_1");
    }
}
