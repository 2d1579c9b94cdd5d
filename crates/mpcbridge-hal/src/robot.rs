//! Generic `RobotInterface` trait for whole-body position/velocity/effort
//! controlled robots.
//!
//! Drivers implement this trait and hand themselves to the bridge.  The rest
//! of the stack only ever talks to the trait, so drivers can be swapped
//! without touching planning or resampling logic.

use mpcbridge_types::{BridgeError, JointNameMap};

/// A robot whose joints accept named position, velocity and effort
/// references.
///
/// References are staged with the `set_*` methods and only reach the
/// hardware when [`commit`][Self::commit] (the "move" step) is called.
/// Names that do not belong to the robot, such as the virtual floating-base
/// joints, are ignored by implementations.
pub trait RobotInterface: Send {
    /// Read the current physical state from the hardware.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HardwareFault`] if the state cannot be read.
    fn sense(&mut self) -> Result<(), BridgeError>;

    /// Ordered names of the actuated joints.
    fn joint_names(&self) -> &[String];

    /// Number of actuated joints.
    fn joint_num(&self) -> usize {
        self.joint_names().len()
    }

    /// The currently staged position reference, by joint name.
    fn position_reference(&self) -> JointNameMap;

    /// The currently staged velocity reference, by joint name.
    fn velocity_reference(&self) -> JointNameMap;

    /// The staged position reference in [`joint_names`][Self::joint_names]
    /// order.  Joints without a reference read as `0.0`.
    fn position_reference_vec(&self) -> Vec<f64> {
        let map = self.position_reference();
        ordered(self.joint_names(), &map)
    }

    /// The staged velocity reference in [`joint_names`][Self::joint_names]
    /// order.
    fn velocity_reference_vec(&self) -> Vec<f64> {
        let map = self.velocity_reference();
        ordered(self.joint_names(), &map)
    }

    fn set_position_reference(&mut self, reference: &JointNameMap) -> Result<(), BridgeError>;

    fn set_velocity_reference(&mut self, reference: &JointNameMap) -> Result<(), BridgeError>;

    fn set_effort_reference(&mut self, reference: &JointNameMap) -> Result<(), BridgeError>;

    /// Send every staged reference to the actuators in one go.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HardwareFault`] when the actuators refuse the
    /// command.
    fn commit(&mut self) -> Result<(), BridgeError>;
}

fn ordered(names: &[String], map: &JointNameMap) -> Vec<f64> {
    names
        .iter()
        .map(|name| map.get(name).copied().unwrap_or(0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process robot used only for tests.
    struct MockRobot {
        names: Vec<String>,
        position: JointNameMap,
        velocity: JointNameMap,
    }

    impl MockRobot {
        fn new(names: &[&str]) -> Self {
            Self {
                names: names.iter().map(|n| n.to_string()).collect(),
                position: JointNameMap::new(),
                velocity: JointNameMap::new(),
            }
        }
    }

    impl RobotInterface for MockRobot {
        fn sense(&mut self) -> Result<(), BridgeError> {
            Ok(())
        }

        fn joint_names(&self) -> &[String] {
            &self.names
        }

        fn position_reference(&self) -> JointNameMap {
            self.position.clone()
        }

        fn velocity_reference(&self) -> JointNameMap {
            self.velocity.clone()
        }

        fn set_position_reference(&mut self, reference: &JointNameMap) -> Result<(), BridgeError> {
            self.position.extend(reference.iter().map(|(k, v)| (k.clone(), *v)));
            Ok(())
        }

        fn set_velocity_reference(&mut self, reference: &JointNameMap) -> Result<(), BridgeError> {
            self.velocity.extend(reference.iter().map(|(k, v)| (k.clone(), *v)));
            Ok(())
        }

        fn set_effort_reference(&mut self, _reference: &JointNameMap) -> Result<(), BridgeError> {
            Ok(())
        }

        fn commit(&mut self) -> Result<(), BridgeError> {
            Ok(())
        }
    }

    #[test]
    fn joint_num_follows_joint_names() {
        let robot = MockRobot::new(&["hip", "knee", "ankle"]);
        assert_eq!(robot.joint_num(), 3);
    }

    #[test]
    fn reference_vectors_follow_joint_order_and_default_to_zero() {
        let mut robot = MockRobot::new(&["hip", "knee"]);
        let reference = JointNameMap::from([("knee".to_string(), 0.7)]);
        robot.set_position_reference(&reference).unwrap();
        robot.set_velocity_reference(&reference).unwrap();

        assert_eq!(robot.position_reference_vec(), vec![0.0, 0.7]);
        assert_eq!(robot.velocity_reference_vec(), vec![0.0, 0.7]);
    }
}
