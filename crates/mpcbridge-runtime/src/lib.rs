//! `mpcbridge-runtime` – the control-rate side of the planner bridge.
//!
//! # Modules
//!
//! - [`bridge`] – [`SolutionBridge`]: two-slot solution handoff, state and
//!   input assembly, and the per-tick conversion into named joint references
//!   with torque offsets.
//! - [`control_loop`] – [`ControlLoop`]: the ingest and tick tasks that feed
//!   a shared bridge from the event bus and a fixed-rate timer.
//! - [`horizon_guard`] – [`HorizonGuard`]: caps how far the engine is
//!   resampled past the last solution.
//! - [`config`] – [`BridgeConfig`]: rates, offsets, limits.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP export.
//!
//! # Verification
//!
//! Every command passes through a [`CommandVerifier`] before it reaches the
//! robot; it is re-exported here so callers can register extra rules without
//! depending on `mpcbridge-kernel` directly.

pub mod bridge;
pub mod config;
pub mod control_loop;
pub mod horizon_guard;
pub mod telemetry;

pub use bridge::{SolutionBridge, Sizing};
pub use config::BridgeConfig;
pub use control_loop::{ControlLoop, SharedBridge, lock_bridge};
pub use horizon_guard::HorizonGuard;
pub use telemetry::{TracerProviderGuard, init_tracing};

pub use mpcbridge_kernel::CommandVerifier;
