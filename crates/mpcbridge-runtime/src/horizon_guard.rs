//! [`HorizonGuard`] – stops the resampler from running past the planner.
//!
//! Between two planner solutions the control loop advances the engine by one
//! control period per tick.  When the next solution is late, blindly
//! continuing would extrapolate the last solution indefinitely.  The guard
//! accumulates the resampled time since the last ingest and only admits steps
//! that stay within one planner period; once the budget is spent the tick
//! holds the last resampled state until [`HorizonGuard::reset`] is called by
//! the next ingest.
//!
//! # Example
//!
//! ```rust
//! use mpcbridge_runtime::horizon_guard::HorizonGuard;
//!
//! let mut guard = HorizonGuard::new(0.03);
//!
//! assert_eq!(guard.admit(0.02).dt, 0.02);
//! let step = guard.admit(0.02);
//! assert!((step.dt - 0.01).abs() < 1e-12); // clamped to the remaining budget
//! assert!(step.newly_exhausted);
//! assert_eq!(guard.admit(0.02).dt, 0.0); // holding
//!
//! guard.reset();
//! assert_eq!(guard.admit(0.02).dt, 0.02);
//! ```

/// Floating-point slack so that `n` steps of `horizon / n` fit exactly.
const SLACK: f64 = 1.0e-9;

/// Outcome of [`HorizonGuard::admit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// Seconds the engine may actually advance (may be `0.0`).
    pub dt: f64,
    /// `true` only on the step that used up the budget.
    pub newly_exhausted: bool,
}

pub struct HorizonGuard {
    horizon: f64,
    elapsed: f64,
    exhausted: bool,
}

impl HorizonGuard {
    pub fn new(horizon: f64) -> Self {
        Self {
            horizon,
            elapsed: 0.0,
            exhausted: false,
        }
    }

    /// Request to advance by `dt` seconds.
    pub fn admit(&mut self, dt: f64) -> Step {
        let remaining = (self.horizon - self.elapsed).max(0.0);
        if dt <= remaining + SLACK {
            self.elapsed += dt;
            return Step { dt, newly_exhausted: false };
        }
        let newly_exhausted = !self.exhausted;
        self.exhausted = true;
        self.elapsed = self.horizon;
        Step { dt: remaining, newly_exhausted }
    }

    /// Seconds resampled since the last reset.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Start a fresh budget; called whenever a new solution is ingested.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.exhausted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_whole_steps_within_horizon() {
        let mut guard = HorizonGuard::new(0.03);
        for _ in 0..15 {
            let step = guard.admit(0.002);
            assert_eq!(step.dt, 0.002);
            assert!(!step.newly_exhausted);
        }
        assert!(!guard.is_exhausted());
    }

    #[test]
    fn exhaustion_is_reported_once() {
        let mut guard = HorizonGuard::new(0.01);
        assert!(!guard.admit(0.01).newly_exhausted);
        let first = guard.admit(0.01);
        assert_eq!(first.dt, 0.0);
        assert!(first.newly_exhausted);
        let second = guard.admit(0.01);
        assert_eq!(second.dt, 0.0);
        assert!(!second.newly_exhausted);
        assert!(guard.is_exhausted());
    }

    #[test]
    fn reset_restores_budget() {
        let mut guard = HorizonGuard::new(0.01);
        guard.admit(0.02);
        assert!(guard.is_exhausted());
        guard.reset();
        assert_eq!(guard.elapsed(), 0.0);
        assert_eq!(guard.admit(0.005).dt, 0.005);
    }

    #[test]
    fn zero_horizon_holds_immediately() {
        let mut guard = HorizonGuard::new(0.0);
        let step = guard.admit(0.002);
        assert_eq!(step.dt, 0.0);
        assert!(step.newly_exhausted);
    }
}
