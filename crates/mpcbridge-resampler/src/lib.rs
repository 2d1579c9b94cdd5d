//! `mpcbridge-resampler` – the resampling engine seam.
//!
//! The bridge treats interpolation between planner solutions as an opaque
//! engine reached through the [`ResamplingEngine`] trait.
//!
//! # Modules
//!
//! - [`engine`] – [`ResamplingEngine`][engine::ResamplingEngine]: the
//!   capability trait consumed by the bridge (state/input storage, time
//!   stepping, coordinate conversions).
//! - [`model`] – [`FloatingBaseModel`][model::FloatingBaseModel]: sizing of a
//!   floating-base mechanism with a quaternion base orientation.
//! - [`integrator`] – [`IntegratingResampler`][integrator::IntegratingResampler]:
//!   a reference engine that integrates the stored acceleration input with a
//!   semi-implicit Euler step.  Used by the simulator and in tests.

pub mod engine;
pub mod integrator;
pub mod model;

pub use engine::ResamplingEngine;
pub use integrator::IntegratingResampler;
pub use model::FloatingBaseModel;
