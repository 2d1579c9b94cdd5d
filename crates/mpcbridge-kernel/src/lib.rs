//! `mpcbridge-kernel` – safety checks around the bridge.
//!
//! It does not compute commands; it decides whether a command may reach the
//! actuators and whether the planner is still alive.
//!
//! # Modules
//!
//! - [`command_verifier`] – [`CommandVerifier`][command_verifier::CommandVerifier]:
//!   a rule engine that validates every [`JointCommand`][mpcbridge_types::JointCommand]
//!   before any reference is written to the robot.
//! - [`watchdog`] – [`SolutionWatchdog`][watchdog::SolutionWatchdog]:
//!   tracks the age of the last ingested planner solution and reports
//!   fresh/stale transitions.

pub mod command_verifier;
pub mod watchdog;

pub use command_verifier::{CommandVerifier, EffortLimitRule, FiniteCommandRule, Rule};
pub use watchdog::{SolutionWatchdog, Staleness, Transition};
