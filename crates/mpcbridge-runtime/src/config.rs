//! [`BridgeConfig`] – tuning knobs of the bridge and its control loop.

use std::collections::HashMap;
use std::time::Duration;

use mpcbridge_types::{BridgeError, JointNameMap};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Control loop frequency in Hz.
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,

    /// Planner period in seconds; the resampler never runs further than this
    /// past the last ingested solution.
    #[serde(default = "default_mpc_dt")]
    pub mpc_dt: f64,

    /// Advance the engine by one control period on every tick.
    #[serde(default = "default_resample_on_tick")]
    pub resample_on_tick: bool,

    /// Raise a planner-stale alert after this long without a solution.
    #[serde(default = "default_planner_timeout_ms")]
    pub planner_timeout_ms: u64,

    /// Per-joint bias subtracted from the commanded effort.
    #[serde(default)]
    pub torque_offset: JointNameMap,

    /// Per-joint absolute effort caps checked before dispatch.
    #[serde(default)]
    pub effort_limits: HashMap<String, f64>,
}

fn default_rate_hz() -> f64 {
    500.0
}
fn default_mpc_dt() -> f64 {
    0.03
}
fn default_resample_on_tick() -> bool {
    true
}
fn default_planner_timeout_ms() -> u64 {
    500
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            mpc_dt: default_mpc_dt(),
            resample_on_tick: default_resample_on_tick(),
            planner_timeout_ms: default_planner_timeout_ms(),
            torque_offset: JointNameMap::new(),
            effort_limits: HashMap::new(),
        }
    }
}

impl BridgeConfig {
    /// Control period in seconds.
    pub fn dt(&self) -> f64 {
        1.0 / self.rate_hz
    }

    /// Control period.  Only meaningful on a config that passed
    /// [`validate`][Self::validate].
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(self.dt()).unwrap_or(Duration::ZERO)
    }

    /// Planner period as a [`Duration`].  Only meaningful on a config that
    /// passed [`validate`][Self::validate].
    pub fn planner_period(&self) -> Duration {
        Duration::try_from_secs_f64(self.mpc_dt).unwrap_or(Duration::ZERO)
    }

    pub fn planner_timeout(&self) -> Duration {
        Duration::from_millis(self.planner_timeout_ms)
    }

    /// Reject settings the control loop cannot run with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if !self.rate_hz.is_finite() || self.rate_hz <= 0.0 {
            return Err(BridgeError::Config(format!(
                "rate_hz must be positive, got {}",
                self.rate_hz
            )));
        }
        if !self.mpc_dt.is_finite() || self.mpc_dt <= 0.0 {
            return Err(BridgeError::Config(format!(
                "mpc_dt must be positive, got {}",
                self.mpc_dt
            )));
        }
        nonzero_duration("control period (1 / rate_hz)", self.dt())?;
        nonzero_duration("mpc_dt", self.mpc_dt)?;
        if let Some((joint, cap)) = self.effort_limits.iter().find(|(_, c)| !(**c >= 0.0)) {
            return Err(BridgeError::Config(format!(
                "effort limit for '{joint}' must be non-negative, got {cap}"
            )));
        }
        Ok(())
    }
}

/// Timers need a period that is representable and at least one nanosecond.
fn nonzero_duration(what: &str, seconds: f64) -> Result<Duration, BridgeError> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(d) if !d.is_zero() => Ok(d),
        Ok(_) => Err(BridgeError::Config(format!(
            "{what} of {seconds} s rounds to zero"
        ))),
        Err(e) => Err(BridgeError::Config(format!(
            "{what} of {seconds} s is not a valid duration: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, BridgeConfig::default());
        assert!((cfg.dt() - 0.002).abs() < 1e-12);
        assert_eq!(cfg.planner_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn torque_offsets_parse_from_table() {
        let cfg: BridgeConfig = toml::from_str(
            r#"
            rate_hz = 1000.0
            [torque_offset]
            knee = 0.5
            hip = -0.25
            "#,
        )
        .unwrap();
        assert_eq!(cfg.rate_hz, 1000.0);
        assert_eq!(cfg.torque_offset["knee"], 0.5);
        assert_eq!(cfg.torque_offset["hip"], -0.25);
    }

    #[test]
    fn validate_rejects_non_positive_rate() {
        let cfg = BridgeConfig { rate_hz: 0.0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn validate_rejects_nan_mpc_dt() {
        let cfg = BridgeConfig { mpc_dt: f64::NAN, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_rate_with_zero_period() {
        let cfg = BridgeConfig { rate_hz: 1e12, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(BridgeError::Config(_))));

        let cfg = BridgeConfig { rate_hz: 1e-300, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn validate_rejects_unrepresentable_mpc_dt() {
        for mpc_dt in [1e300, 1e-12] {
            let cfg = BridgeConfig { mpc_dt, ..Default::default() };
            assert!(matches!(cfg.validate(), Err(BridgeError::Config(_))), "mpc_dt = {mpc_dt}");
        }
    }

    #[test]
    fn validated_config_has_usable_periods() {
        let cfg = BridgeConfig { rate_hz: 4.0, mpc_dt: 0.5, ..Default::default() };
        cfg.validate().unwrap();
        assert_eq!(cfg.period(), Duration::from_millis(250));
        assert_eq!(cfg.planner_period(), Duration::from_millis(500));
    }

    #[test]
    fn validate_rejects_negative_effort_limit() {
        let mut cfg = BridgeConfig::default();
        cfg.effort_limits.insert("knee".to_string(), -1.0);
        assert!(cfg.validate().is_err());
    }
}
