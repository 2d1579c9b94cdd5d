//! `mpcbridge-hal` – actuator abstraction.
//!
//! The bridge never talks to motor drivers directly.  It reads and writes
//! named-joint references through the [`RobotInterface`] trait; concrete
//! robots (real drivers, [`SimRobot`] in CI) live behind it.

pub mod robot;
pub mod sim;

pub use robot::RobotInterface;
pub use sim::SimRobot;
