//! # Message Bus
//!
//! Defines the publishing side of the bus and owns the topic registry.

use crate::subscriber::Subscription;
use crate::topic::{SubscriptionId, Topic};
use crate::{BusConfig, BusError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// One registered receiver on a topic.
struct Subscriber<M> {
    sender: mpsc::UnboundedSender<M>,
    token: CancellationToken,
}

struct Registry<M> {
    /// Topic -> subscribers registered on it.
    topics: HashMap<Topic, HashMap<SubscriptionId, Subscriber<M>>>,
    /// Subscription -> the topic it lives on.
    index: HashMap<SubscriptionId, Topic>,
}

impl<M> Default for Registry<M> {
    fn default() -> Self {
        Self {
            topics: HashMap::new(),
            index: HashMap::new(),
        }
    }
}

pub(crate) struct BusInner<M> {
    registry: Mutex<Registry<M>>,
    root: CancellationToken,
    config: BusConfig,
    messages_published: AtomicU64,
}

impl<M> BusInner<M> {
    /// Cancel and deregister one subscription. Returns false if it was
    /// already gone.
    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock();
        let Some(topic) = registry.index.remove(&id) else {
            return false;
        };

        let removed = match registry.topics.get_mut(&topic) {
            Some(subscribers) => {
                let removed = subscribers.remove(&id);
                if subscribers.is_empty() {
                    registry.topics.remove(&topic);
                }
                removed
            }
            None => None,
        };

        // Cancel while still holding the lock: no publish can slip in between.
        if let Some(subscriber) = removed {
            subscriber.token.cancel();
        }
        debug!(subscription_id = %id, topic = %topic, "Subscription removed");
        true
    }
}

/// In-memory topic-keyed broker.
///
/// Cheap to clone; all clones share one registry.
pub struct MessageBus<M> {
    inner: Arc<BusInner<M>>,
}

impl<M> Clone for MessageBus<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> std::fmt::Debug for MessageBus<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.inner.registry.lock();
        f.debug_struct("MessageBus")
            .field("topics", &registry.topics.len())
            .field("subscriptions", &registry.index.len())
            .field("closed", &self.inner.root.is_cancelled())
            .finish()
    }
}

impl<M> Default for MessageBus<M>
where
    M: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M> MessageBus<M>
where
    M: Clone + Send + 'static,
{
    /// Create a bus with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a bus with explicit limits.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: Mutex::new(Registry::default()),
                root: CancellationToken::new(),
                config,
                messages_published: AtomicU64::new(0),
            }),
        }
    }

    /// Deliver `message` to every subscriber registered on `topic` right now.
    ///
    /// Never blocks on a consumer. Returns the number of subscribers reached.
    pub fn publish(&self, topic: &Topic, message: M) -> usize {
        self.inner.messages_published.fetch_add(1, Ordering::Relaxed);

        let registry = self.inner.registry.lock();
        let Some(subscribers) = registry.topics.get(topic) else {
            trace!(topic = %topic, "Message dropped (no subscribers)");
            return 0;
        };

        let mut delivered = 0;
        for (id, subscriber) in subscribers {
            // Checked at send time rather than relying on the channel closing.
            if subscriber.token.is_cancelled() {
                continue;
            }
            match subscriber.sender.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    trace!(subscription_id = %id, topic = %topic, "Receiver gone");
                }
            }
        }
        delivered
    }

    /// Register a new subscriber on `topic`.
    ///
    /// # Errors
    ///
    /// - `InvalidTopic` for a blank topic
    /// - `SubscriberLimit` when the topic is full
    /// - `Closed` after `shutdown()`
    pub fn subscribe(&self, topic: impl Into<Topic>) -> Result<Subscription<M>, BusError> {
        let topic = topic.into();
        if topic.is_blank() {
            return Err(BusError::InvalidTopic(topic.as_str().to_string()));
        }

        let mut registry = self.inner.registry.lock();
        if self.inner.root.is_cancelled() {
            return Err(BusError::Closed);
        }

        let limit = self.inner.config.max_subscribers_per_topic;
        let current = registry.topics.get(&topic).map_or(0, HashMap::len);
        if current >= limit {
            return Err(BusError::SubscriberLimit {
                topic: topic.as_str().to_string(),
                limit,
            });
        }

        let id = SubscriptionId::new();
        let token = self.inner.root.child_token();
        let (sender, receiver) = mpsc::unbounded_channel();

        registry.index.insert(id, topic.clone());
        registry.topics.entry(topic.clone()).or_default().insert(
            id,
            Subscriber {
                sender,
                token: token.clone(),
            },
        );
        drop(registry);

        debug!(subscription_id = %id, topic = %topic, "New subscription created");

        Ok(Subscription::new(
            id,
            topic,
            receiver,
            token,
            Arc::downgrade(&self.inner),
        ))
    }

    /// Cancel a subscription and remove it from its topic.
    ///
    /// Idempotent: returns false when the id is unknown or already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.remove(id)
    }

    /// Cancel every subscription and refuse new ones.
    pub fn shutdown(&self) {
        self.inner.root.cancel();
        let dropped = {
            let mut registry = self.inner.registry.lock();
            let count = registry.index.len();
            registry.index.clear();
            registry.topics.clear();
            count
        };
        info!(subscriptions = dropped, "Message bus shut down");
    }

    /// True once `shutdown()` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.root.is_cancelled()
    }

    /// Number of live subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.inner
            .registry
            .lock()
            .topics
            .get(topic)
            .map_or(0, HashMap::len)
    }

    /// Total live subscriptions across all topics.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.lock().index.len()
    }

    /// Number of topics with at least one subscriber.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.inner.registry.lock().topics.len()
    }

    /// Total `publish()` calls, including those that reached nobody.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.inner.messages_published.load(Ordering::Relaxed)
    }

    /// The limits this bus was built with.
    #[must_use]
    pub fn config(&self) -> BusConfig {
        self.inner.config
    }
}
