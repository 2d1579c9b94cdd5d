//! [`ControlLoop`] – drives a [`SolutionBridge`] from the event bus and a
//! fixed-rate timer.
//!
//! Two tasks share the bridge behind one mutex:
//!
//! - the **ingest task** receives [`EventPayload::Solution`] events on
//!   [`Topic::Solutions`] and hands them to [`SolutionBridge::ingest`];
//! - the **tick task** fires every control period, skips until the first
//!   solution has been ingested, then runs [`SolutionBridge::tick`] and polls
//!   the planner watchdog.
//!
//! The lock is never held across an `.await`, so an ingest and a tick are
//! serialized but neither can stall the executor.  Failures never stop the
//! loop: they are logged and latched on [`Topic::SystemAlerts`] as
//! [`EventPayload::BridgeFault`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use mpcbridge_hal::RobotInterface;
use mpcbridge_kernel::Transition;
use mpcbridge_middleware::{EventBus, Topic, TopicReceiver};
use mpcbridge_resampler::ResamplingEngine;
use mpcbridge_types::{BridgeError, Event, EventPayload};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::bridge::SolutionBridge;

const SOURCE: &str = "mpcbridge-runtime::control_loop";

/// How often the ingest task wakes up to check the shutdown flag while the
/// planner is silent.
const RECV_POLL: Duration = Duration::from_millis(50);

pub type SharedBridge<E, R> = Arc<Mutex<SolutionBridge<E, R>>>;

pub struct ControlLoop<E, R> {
    bridge: SharedBridge<E, R>,
    bus: EventBus,
    period: Duration,
    shutdown: Arc<AtomicBool>,
}

impl<E, R> ControlLoop<E, R>
where
    E: ResamplingEngine + 'static,
    R: RobotInterface + 'static,
{
    /// Wrap `bridge`; ticks fire every `period`.
    pub fn new(bridge: SolutionBridge<E, R>, bus: EventBus, period: Duration) -> Self {
        Self {
            bridge: Arc::new(Mutex::new(bridge)),
            bus,
            period,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared handle to the bridge, e.g. for [`SolutionBridge::set_torque_offset`].
    pub fn bridge(&self) -> SharedBridge<E, R> {
        Arc::clone(&self.bridge)
    }

    /// Setting this flag stops both tasks at their next wake-up.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Start the ingest and tick tasks on the current tokio runtime.
    ///
    /// The solution subscription is taken before this returns, so every
    /// solution published afterwards reaches the bridge.
    pub fn spawn(&self) -> (JoinHandle<()>, JoinHandle<()>) {
        let rx = self.bus.subscribe_to(Topic::Solutions);
        let ingest = tokio::spawn(ingest_task(
            rx,
            Arc::clone(&self.bridge),
            self.bus.clone(),
            Arc::clone(&self.shutdown),
        ));
        let tick = tokio::spawn(tick_task(
            Arc::clone(&self.bridge),
            self.bus.clone(),
            self.period,
            Arc::clone(&self.shutdown),
        ));
        info!(period_ms = self.period.as_secs_f64() * 1e3, "control loop started");
        (ingest, tick)
    }
}

/// Lock the bridge, turning a poisoned mutex into a channel error.
pub fn lock_bridge<E, R>(
    bridge: &Mutex<SolutionBridge<E, R>>,
) -> Result<MutexGuard<'_, SolutionBridge<E, R>>, BridgeError> {
    bridge
        .lock()
        .map_err(|_| BridgeError::Channel("bridge mutex poisoned".to_string()))
}

fn publish_fault(bus: &EventBus, component: &str, err: &BridgeError) {
    bus.publish_latched(
        Topic::SystemAlerts,
        Event::new(
            SOURCE,
            EventPayload::BridgeFault {
                component: component.to_string(),
                code: err.code(),
                message: err.to_string(),
            },
        ),
    );
}

async fn ingest_task<E, R>(
    mut rx: TopicReceiver,
    bridge: SharedBridge<E, R>,
    bus: EventBus,
    shutdown: Arc<AtomicBool>,
) where
    E: ResamplingEngine,
    R: RobotInterface,
{
    while !shutdown.load(Ordering::Relaxed) {
        let event = match tokio::time::timeout(RECV_POLL, rx.recv()).await {
            Err(_) => continue,
            Ok(Ok(event)) => event,
            Ok(Err(RecvError::Lagged(n))) => {
                warn!(dropped = n, "solution subscriber lagged; older solutions skipped");
                continue;
            }
            Ok(Err(RecvError::Closed)) => break,
        };

        let EventPayload::Solution(solution) = event.payload else {
            trace!(source = %event.source, "non-solution event on solutions topic ignored");
            continue;
        };

        let result = lock_bridge(&bridge).and_then(|mut b| b.ingest(solution));
        match result {
            Ok(()) => debug!(source = %event.source, "solution ingested"),
            Err(e @ BridgeError::Channel(_)) => {
                error!(error = %e, "ingest task stopping");
                publish_fault(&bus, "ingest", &e);
                break;
            }
            Err(e) => {
                error!(error = %e, code = e.code(), "solution rejected");
                publish_fault(&bus, "ingest", &e);
            }
        }
    }
    debug!("ingest task stopped");
}

async fn tick_task<E, R>(
    bridge: SharedBridge<E, R>,
    bus: EventBus,
    period: Duration,
    shutdown: Arc<AtomicBool>,
) where
    E: ResamplingEngine,
    R: RobotInterface,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !shutdown.load(Ordering::Relaxed) {
        interval.tick().await;

        let outcome = lock_bridge(&bridge).map(|mut b| {
            if b.is_ready() {
                Some((b.poll_planner(), b.tick()))
            } else {
                None
            }
        });
        let (transition, result) = match outcome {
            Ok(Some(outcome)) => outcome,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "tick task stopping");
                publish_fault(&bus, "tick", &e);
                break;
            }
        };

        match transition {
            Some(Transition::BecameStale { age }) => {
                warn!(age_ms = age.as_millis() as u64, "planner solutions are stale");
                publish_fault(
                    &bus,
                    "planner",
                    &BridgeError::PlannerStale { age_ms: age.as_millis() as u64 },
                );
            }
            Some(Transition::Recovered) => info!("planner solutions resumed"),
            None => {}
        }

        if let Err(e) = result {
            error!(error = %e, code = e.code(), "control tick failed");
            publish_fault(&bus, "tick", &e);
        }
    }
    debug!("tick task stopped");
}
