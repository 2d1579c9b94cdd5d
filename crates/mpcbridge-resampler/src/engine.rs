//! [`ResamplingEngine`] – the contract between the bridge and whatever turns
//! low-rate planner solutions into control-rate commands.

use mpcbridge_types::{BridgeError, JointNameMap, WRENCH_SIZE};
use nalgebra::DVector;

/// An engine holding a state `x = [q; v]` and an input `u = [a; wrenches]`
/// sized to one kinematic model.
///
/// Implementations must reject vectors of the wrong length instead of
/// resizing themselves: the bridge relies on a rejected `set_state` or
/// `set_input` leaving the previously stored vector untouched.
pub trait ResamplingEngine: Send {
    /// Register the contact frames whose wrenches follow the acceleration in
    /// the input vector.  Changes [`input_size`][Self::input_size].
    fn set_frames(&mut self, frames: &[String]);

    /// Currently registered contact frames.
    fn frames(&self) -> &[String];

    /// Size of the generalized position.
    fn nq(&self) -> usize;

    /// Size of the generalized velocity.
    fn nv(&self) -> usize;

    /// Expected length of the state vector.
    fn state_size(&self) -> usize {
        self.nq() + self.nv()
    }

    /// Expected length of the input vector.
    fn input_size(&self) -> usize {
        self.nv() + WRENCH_SIZE * self.frames().len()
    }

    /// Replace the stored state.
    ///
    /// # Errors
    ///
    /// [`BridgeError::DimensionMismatch`] when `x` is not
    /// [`state_size`][Self::state_size] long.
    fn set_state(&mut self, x: &DVector<f64>) -> Result<(), BridgeError>;

    /// Replace the stored input.
    ///
    /// # Errors
    ///
    /// [`BridgeError::DimensionMismatch`] when `u` is not
    /// [`input_size`][Self::input_size] long.
    fn set_input(&mut self, u: &DVector<f64>) -> Result<(), BridgeError>;

    /// The current (possibly resampled) state.
    fn state(&self) -> DVector<f64>;

    /// The stored input.
    fn input(&self) -> DVector<f64>;

    /// Joint torques consistent with the current state and input, `nv` long.
    fn tau(&self) -> DVector<f64>;

    /// Advance the stored state by `dt` seconds.
    fn resample(&mut self, dt: f64) -> Result<(), BridgeError>;

    /// Convert a generalized position into its minimal form (`nv` long).
    fn minimal_q(&self, q: &DVector<f64>) -> Result<DVector<f64>, BridgeError>;

    /// Build a generalized position from a named-joint map.
    fn map_to_q(&self, joints: &JointNameMap) -> DVector<f64>;
}
