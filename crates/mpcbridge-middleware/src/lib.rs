//! `mpcbridge-middleware` – in-process message plumbing.
//!
//! Carries planner solutions into the bridge and resampled diagnostics out of
//! it without caring about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels, with a latched last-value slot per topic.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
