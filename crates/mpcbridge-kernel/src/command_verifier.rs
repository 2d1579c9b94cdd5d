//! [`CommandVerifier`] – last interlock before the actuators.
//!
//! The control tick builds a complete [`JointCommand`] and passes it through
//! [`CommandVerifier::verify`] before touching the robot.  Every registered
//! [`Rule`] is evaluated in order; the first violation returns
//! [`BridgeError::CommandRejected`] and **none** of the references are
//! written.
//!
//! Two built-in rules are provided:
//! - [`FiniteCommandRule`] – rejects commands containing NaN or infinite
//!   values.
//! - [`EffortLimitRule`] – rejects commands whose absolute effort exceeds a
//!   per-joint cap.

use std::collections::HashMap;

use mpcbridge_types::{BridgeError, JointCommand, JointNameMap};

/// A single invariant that a command must satisfy.
pub trait Rule: Send + Sync {
    /// Human-readable name used in rejection messages.
    fn name(&self) -> &str;

    /// Return `Ok(())` when the command satisfies the invariant, or a
    /// description of the violation.
    fn check(&self, command: &JointCommand) -> Result<(), String>;
}

/// Rule engine validating a [`JointCommand`] against all registered
/// [`Rule`]s.
///
/// # Example
///
/// ```
/// use mpcbridge_kernel::{CommandVerifier, FiniteCommandRule};
/// use mpcbridge_types::{JointCommand, JointNameMap};
///
/// let mut verifier = CommandVerifier::new();
/// verifier.add_rule(Box::new(FiniteCommandRule));
///
/// let mut command = JointCommand::default();
/// command.effort = JointNameMap::from([("knee".to_string(), 1.0)]);
/// assert!(verifier.verify(&command).is_ok());
///
/// command.effort.insert("hip".to_string(), f64::NAN);
/// assert!(verifier.verify(&command).is_err());
/// ```
#[derive(Default)]
pub struct CommandVerifier {
    rules: Vec<Box<dyn Rule>>,
}

impl CommandVerifier {
    /// Create an empty verifier with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier with [`FiniteCommandRule`] and, when `effort_limits` is not
    /// empty, an [`EffortLimitRule`].
    pub fn with_defaults(effort_limits: &HashMap<String, f64>) -> Self {
        let mut verifier = Self::new();
        verifier.add_rule(Box::new(FiniteCommandRule));
        if !effort_limits.is_empty() {
            verifier.add_rule(Box::new(EffortLimitRule::new(effort_limits.clone())));
        }
        verifier
    }

    /// Register a new [`Rule`].  Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Validate `command` against every registered rule.
    pub fn verify(&self, command: &JointCommand) -> Result<(), BridgeError> {
        for rule in &self.rules {
            rule.check(command).map_err(|details| BridgeError::CommandRejected {
                rule: rule.name().to_string(),
                details,
            })?;
        }
        Ok(())
    }
}

/// Rejects any NaN or infinite entry in position, velocity, acceleration or
/// effort.
pub struct FiniteCommandRule;

impl Rule for FiniteCommandRule {
    fn name(&self) -> &str {
        "finite_command"
    }

    fn check(&self, command: &JointCommand) -> Result<(), String> {
        let lanes: [(&str, &JointNameMap); 4] = [
            ("position", &command.position),
            ("velocity", &command.velocity),
            ("acceleration", &command.acceleration),
            ("effort", &command.effort),
        ];
        for (lane, map) in lanes {
            if let Some((joint, value)) = map.iter().find(|(_, v)| !v.is_finite()) {
                return Err(format!("{lane} of '{joint}' is {value}"));
            }
        }
        Ok(())
    }
}

/// Rejects commands whose absolute effort on a listed joint exceeds its cap.
/// Joints without a cap are unrestricted.
pub struct EffortLimitRule {
    limits: HashMap<String, f64>,
}

impl EffortLimitRule {
    pub fn new(limits: HashMap<String, f64>) -> Self {
        Self { limits }
    }
}

impl Rule for EffortLimitRule {
    fn name(&self) -> &str {
        "effort_limit"
    }

    fn check(&self, command: &JointCommand) -> Result<(), String> {
        for (joint, cap) in &self.limits {
            if let Some(effort) = command.effort.get(joint)
                && effort.abs() > *cap
            {
                return Err(format!("effort {effort} on '{joint}' exceeds cap {cap}"));
            }
        }
        Ok(())
    }
}
