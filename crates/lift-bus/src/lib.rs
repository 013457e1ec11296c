//! # Lift Bus - Topic-Keyed Publish/Subscribe
//!
//! A generic in-process broker. It knows nothing about lifts: any
//! `Clone + Send` message type can be routed by string topic.
//!
//! ## Delivery Discipline
//!
//! Asynchronous, non-blocking fan-out:
//!
//! - Every subscriber owns an unbounded FIFO queue, its single serializing point.
//! - `publish()` appends to each queue while holding the topic map lock. Appends
//!   never wait on a consumer, so the lock is never held across a blocked send
//!   and a stalled subscriber can never stall the publisher.
//! - Because publishes to a topic are serialized by that lock, every subscriber
//!   of a topic observes the same total order.
//!
//! ```text
//!  publish(topic, msg)
//!        │
//!        ▼
//! ┌──────────────┐   append    ┌───────────┐   recv()   ┌──────────────┐
//! │  topic map   │ ──────────→ │ queue (A) │ ─────────→ │ Subscription │
//! │ (one lock)   │ ──────────→ │ queue (B) │ ─────────→ │ Subscription │
//! └──────────────┘             └───────────┘            └──────────────┘
//! ```
//!
//! ## Cancellation
//!
//! Each subscription carries a child of the bus's root `CancellationToken`.
//! Unsubscribing cancels the token before removing the registration, and the
//! receive side checks the token before yielding. Nothing is observed after
//! cancellation, including messages that were already buffered.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod publisher;
pub mod subscriber;
pub mod topic;

use thiserror::Error;

pub use publisher::MessageBus;
pub use subscriber::{Subscription, SubscriptionError};
pub use topic::{SubscriptionId, Topic};

/// Default cap on concurrent subscribers for a single topic.
pub const DEFAULT_MAX_SUBSCRIBERS_PER_TOPIC: usize = 1024;

/// Errors returned by bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus has been shut down and accepts no new subscriptions.
    #[error("message bus closed")]
    Closed,

    /// The topic cannot be used as a routing key.
    #[error("invalid topic: {0:?}")]
    InvalidTopic(String),

    /// The topic already has the maximum number of subscribers.
    #[error("topic {topic} has reached its subscriber limit of {limit}")]
    SubscriberLimit { topic: String, limit: usize },
}

/// Bus tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Maximum concurrent subscribers per topic.
    pub max_subscribers_per_topic: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_subscribers_per_topic: DEFAULT_MAX_SUBSCRIBERS_PER_TOPIC,
        }
    }
}
