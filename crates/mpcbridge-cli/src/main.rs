//! `mpcbridge` – runs the planner bridge against a simulated robot.
//!
//! 1. Installs logging (see `mpcbridge_runtime::telemetry`).
//! 2. Loads `~/.mpcbridge/config.toml` or the path given as the first
//!    argument, then applies `MPCBRIDGE_*` overrides.
//! 3. Builds the bus, a [`SimRobot`] and an [`IntegratingResampler`], and
//!    starts the [`ControlLoop`].
//! 4. Replays the configured solution file at the planner period.
//! 5. **Ctrl-C** stops every task and prints a summary.

mod config;
mod replay;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use tracing::{error, info, warn};

use mpcbridge_hal::SimRobot;
use mpcbridge_middleware::EventBus;
use mpcbridge_resampler::{FloatingBaseModel, IntegratingResampler};
use mpcbridge_runtime::{ControlLoop, SolutionBridge, init_tracing, lock_bridge};
use mpcbridge_types::TrajectorySolution;

fn main() -> ExitCode {
    // Before the runtime exists: the span exporter is synchronous.
    let _telemetry = init_tracing("mpcbridge");

    print_banner();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::config_path);
    if !config_path.exists() {
        match config::save_to(&config::Config::default(), &config_path) {
            Ok(()) => println!("  Wrote default config to {}", config_path.display()),
            Err(e) => warn!(error = %e, "could not write default config"),
        }
    }
    let cfg = match config::resolve(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };
    println!("  Config: {}", config_path.display().to_string().bold());

    let solutions = match &cfg.solutions {
        Some(path) => match replay::load_solutions(path) {
            Ok(solutions) => solutions,
            Err(e) => {
                eprintln!("{}: {e}", "Replay error".red());
                return ExitCode::FAILURE;
            }
        },
        None => Vec::new(),
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_ctrlc = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping control loop …".yellow().bold());
        shutdown_ctrlc.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop the process with a signal instead");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg, solutions, shutdown)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "Bridge error".red());
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cfg: config::Config,
    solutions: Vec<TrajectorySolution>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), String> {
    let joint_names = robot_joints(&cfg, &solutions);
    if joint_names.is_empty() {
        warn!("no actuated joints configured; only the floating base will be commanded");
    }

    let bus = EventBus::default();
    let engine = IntegratingResampler::new(FloatingBaseModel::new(joint_names.iter().cloned()));
    let robot = SimRobot::new(joint_names.iter().cloned());
    let period = cfg.bridge.period();
    let planner_period = cfg.bridge.planner_period();
    let bridge = SolutionBridge::new(engine, robot, bus.clone(), cfg.bridge.clone())
        .map_err(|e| e.to_string())?;

    let control = ControlLoop::new(bridge, bus.clone(), period);
    let control_shutdown = control.shutdown_handle();
    let (ingest, tick) = control.spawn();

    println!(
        "  Control loop at {} Hz, planner period {} s, {} joint(s)",
        cfg.bridge.rate_hz.to_string().bold(),
        cfg.bridge.mpc_dt.to_string().bold(),
        joint_names.len()
    );
    if solutions.is_empty() {
        println!("  {}", "No solution file configured; waiting for Ctrl-C.".dimmed());
    } else {
        println!("  Replaying {} solution(s). Press Ctrl-C to stop.\n", solutions.len());
        tokio::spawn(replay::replay(
            bus.clone(),
            solutions,
            planner_period,
            cfg.loop_replay,
            Arc::clone(&shutdown),
        ));
    }

    while !shutdown.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    control_shutdown.store(true, Ordering::SeqCst);
    for handle in [ingest, tick] {
        if let Err(e) = handle.await {
            warn!(error = %e, "control task ended abnormally");
        }
    }

    let bridge = control.bridge();
    let b = lock_bridge(&bridge).map_err(|e| e.to_string())?;
    info!(
        ingests = b.ingest_count(),
        ticks = b.tick_count(),
        commits = b.robot().commit_count(),
        "bridge stopped"
    );
    println!(
        "  {} {} solution(s) ingested, {} tick(s) dispatched.",
        "✓".green().bold(),
        b.ingest_count(),
        b.tick_count()
    );
    Ok(())
}

/// Configured joints, or the planner's joints from the first solution.
fn robot_joints(cfg: &config::Config, solutions: &[TrajectorySolution]) -> Vec<String> {
    if !cfg.joint_names.is_empty() {
        return cfg.joint_names.clone();
    }
    solutions
        .first()
        .map(|s| s.joint_names.clone())
        .unwrap_or_default()
}

fn print_banner() {
    println!();
    println!("{}", "  ┌──────────────────────────────┐".bold().cyan());
    println!("{}", "  │   mpcbridge  planner → robot │".bold().cyan());
    println!("{}", "  └──────────────────────────────┘".bold().cyan());
    println!(
        "  {}",
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_joints_win_over_solution_joints() {
        let cfg = config::Config {
            joint_names: vec!["hip".into()],
            ..Default::default()
        };
        let solutions = vec![TrajectorySolution {
            joint_names: vec!["knee".into()],
            ..Default::default()
        }];
        assert_eq!(robot_joints(&cfg, &solutions), vec!["hip".to_string()]);
        assert_eq!(
            robot_joints(&config::Config::default(), &solutions),
            vec!["knee".to_string()]
        );
        assert!(robot_joints(&config::Config::default(), &[]).is_empty());
    }
}
