//! Process configuration – reads/writes `~/.mpcbridge/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use mpcbridge_runtime::BridgeConfig;
use serde::{Deserialize, Serialize};

/// Everything the `mpcbridge` process needs besides the bridge tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Actuated joints of the simulated robot.  Empty means "take them from
    /// the first replayed solution".
    #[serde(default)]
    pub joint_names: Vec<String>,

    /// JSON-lines file of planner solutions to replay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solutions: Option<PathBuf>,

    /// Start over from the first line once the file is exhausted.
    #[serde(default)]
    pub loop_replay: bool,

    /// Bridge and control-loop settings, the `[bridge]` table.
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Return the path to `~/.mpcbridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mpcbridge").join("config.toml")
}

/// Load the config at `path`, or `None` if there is no file.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {e}", path.display()))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("Failed to parse config: {e}"))
}

/// Load `path` (or defaults when absent), apply env overrides and validate.
pub fn resolve(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    cfg.bridge.validate().map_err(|e| e.to_string())?;
    Ok(cfg)
}

/// Apply `MPCBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MPCBRIDGE_RATE_HZ` | `bridge.rate_hz` |
/// | `MPCBRIDGE_MPC_DT` | `bridge.mpc_dt` |
/// | `MPCBRIDGE_SOLUTIONS` | `solutions` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MPCBRIDGE_RATE_HZ")
        && let Ok(rate) = v.trim().parse::<f64>()
    {
        cfg.bridge.rate_hz = rate;
    }
    if let Ok(v) = std::env::var("MPCBRIDGE_MPC_DT")
        && let Ok(dt) = v.trim().parse::<f64>()
    {
        cfg.bridge.mpc_dt = dt;
    }
    if let Ok(v) = std::env::var("MPCBRIDGE_SOLUTIONS")
        && !v.is_empty()
    {
        cfg.solutions = Some(PathBuf::from(v));
    }
}

/// Write `cfg` to `path`, creating the parent directory.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {e}"))?;
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {e}"))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_points_to_mpcbridge_dir() {
        let p = config_path_for_home("/home/operator");
        assert_eq!(p, PathBuf::from("/home/operator/.mpcbridge/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config {
            joint_names: vec!["hip".into(), "knee".into()],
            solutions: Some(PathBuf::from("demos/squat.jsonl")),
            ..Default::default()
        };
        cfg.bridge.torque_offset.insert("knee".into(), 0.4);
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.joint_names, cfg.joint_names);
        assert_eq!(loaded.bridge.torque_offset["knee"], 0.4);
        assert_eq!(loaded.solutions, cfg.solutions);
    }

    #[test]
    fn bridge_table_is_optional() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "joint_names = [\"knee\"]\n").unwrap();

        let loaded = load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.bridge.rate_hz, 500.0);
        assert!(loaded.solutions.is_none());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "joint_names = \"knee\"\n").unwrap();
        assert!(load_from(&path).unwrap_err().starts_with("Failed to parse config"));
    }

    #[test]
    fn invalid_bridge_settings_are_reported() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[bridge]\nrate_hz = 0.0\n").unwrap();
        let loaded = load_from(&path).unwrap().unwrap();
        let err = loaded.bridge.validate().unwrap_err();
        assert!(err.to_string().contains("rate_hz"), "{err}");
    }

    // Env overrides share one test so that no two tests race on the
    // process environment.
    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        // SAFETY: the only test in this crate that touches MPCBRIDGE_* vars.
        unsafe {
            std::env::set_var("MPCBRIDGE_RATE_HZ", "1000");
            std::env::set_var("MPCBRIDGE_MPC_DT", "not-a-number");
            std::env::set_var("MPCBRIDGE_SOLUTIONS", "/tmp/run.jsonl");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.bridge.rate_hz, 1000.0);
        assert_eq!(cfg.bridge.mpc_dt, 0.03);
        assert_eq!(cfg.solutions, Some(PathBuf::from("/tmp/run.jsonl")));
        unsafe {
            std::env::remove_var("MPCBRIDGE_RATE_HZ");
            std::env::remove_var("MPCBRIDGE_MPC_DT");
            std::env::remove_var("MPCBRIDGE_SOLUTIONS");
        }
    }
}
