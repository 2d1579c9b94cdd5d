//! [`SolutionWatchdog`] – planner liveness monitor.
//!
//! The ingestion path calls [`SolutionWatchdog::heartbeat`] after every
//! successful ingest; the control loop calls [`SolutionWatchdog::poll`] once
//! per tick.  `poll` only reports *transitions* so a supervisor can raise a
//! single alert when the planner goes silent and a single notice when it
//! comes back, instead of one per control tick.

use std::time::{Duration, Instant};

/// Age classification of the last ingested solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// No solution has been ingested yet.
    Waiting,
    /// The last solution arrived within the timeout.
    Fresh,
    /// The last solution is older than the timeout.
    Stale { age: Duration },
}

/// Change reported by [`SolutionWatchdog::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameStale { age: Duration },
    Recovered,
}

#[derive(Debug, Clone)]
pub struct SolutionWatchdog {
    timeout: Duration,
    last_heartbeat: Option<Instant>,
    stale_reported: bool,
}

impl SolutionWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_heartbeat: None,
            stale_reported: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a successful ingest now.
    pub fn heartbeat(&mut self) {
        self.heartbeat_at(Instant::now());
    }

    pub fn heartbeat_at(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
    }

    pub fn staleness(&self) -> Staleness {
        self.staleness_at(Instant::now())
    }

    pub fn staleness_at(&self, now: Instant) -> Staleness {
        match self.last_heartbeat {
            None => Staleness::Waiting,
            Some(last) => {
                let age = now.saturating_duration_since(last);
                if age <= self.timeout {
                    Staleness::Fresh
                } else {
                    Staleness::Stale { age }
                }
            }
        }
    }

    /// Return the fresh/stale transition since the previous poll, if any.
    pub fn poll(&mut self) -> Option<Transition> {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> Option<Transition> {
        match self.staleness_at(now) {
            Staleness::Stale { age } if !self.stale_reported => {
                self.stale_reported = true;
                Some(Transition::BecameStale { age })
            }
            Staleness::Fresh if self.stale_reported => {
                self.stale_reported = false;
                Some(Transition::Recovered)
            }
            _ => None,
        }
    }
}
