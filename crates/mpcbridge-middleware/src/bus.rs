//! Typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Solutions`] | Planner output, low and jittery rate |
//! | [`Topic::ResamplerOutput`] | Resampled command diagnostic, one per control tick |
//! | [`Topic::SystemAlerts`] | Ingestion faults, planner staleness |
//!
//! # Latching
//!
//! Every topic also keeps the most recent *latched* event in a
//! [`tokio::sync::watch`] slot.  A subscriber that joins late can read it
//! with [`EventBus::latest`] or follow it with
//! [`EventBus::subscribe_latched`].

use std::sync::Arc;

use mpcbridge_types::{BridgeError, Event};
use tokio::sync::{broadcast, watch};
use tracing::trace;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Planner solutions headed for the bridge.
    Solutions,
    /// Resampled position/velocity/effort published by the control tick.
    ResamplerOutput,
    /// Faults and health transitions for the owning process.
    SystemAlerts,
}

#[derive(Debug, Clone)]
struct Lane {
    sender: broadcast::Sender<Event>,
    latch: Arc<watch::Sender<Option<Event>>>,
}

impl Lane {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let (latch, _) = watch::channel(None);
        Self {
            sender,
            latch: Arc::new(latch),
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    solutions: Lane,
    resampler_output: Lane,
    system_alerts: Lane,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        Self {
            solutions: Lane::new(capacity),
            resampler_output: Lane::new(capacity),
            system_alerts: Lane::new(capacity),
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`BridgeError::Channel`] when nobody is listening on the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, BridgeError> {
        self.lane(topic)
            .sender
            .send(event)
            .map_err(|_| BridgeError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Publish `event` and retain it as the topic's latched value.
    ///
    /// Unlike [`publish_to`][Self::publish_to] this never fails: when there
    /// are no live subscribers the event is still stored for late joiners and
    /// `0` is returned.
    pub fn publish_latched(&self, topic: Topic, event: Event) -> usize {
        let lane = self.lane(topic);
        lane.latch.send_replace(Some(event.clone()));
        match lane.sender.send(event) {
            Ok(n) => n,
            Err(_) => {
                trace!(?topic, "latched event stored without live subscribers");
                0
            }
        }
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.lane(topic).sender.subscribe(),
        }
    }

    /// Follow the latched value of `topic`.
    ///
    /// The receiver immediately observes whatever was latched last, even if
    /// it was published before this call.
    pub fn subscribe_latched(&self, topic: Topic) -> watch::Receiver<Option<Event>> {
        self.lane(topic).latch.subscribe()
    }

    /// The most recent latched event on `topic`, if any.
    pub fn latest(&self, topic: Topic) -> Option<Event> {
        self.lane(topic).latch.borrow().clone()
    }

    fn lane(&self, topic: Topic) -> &Lane {
        match topic {
            Topic::Solutions => &self.solutions,
            Topic::ResamplerOutput => &self.resampler_output,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
