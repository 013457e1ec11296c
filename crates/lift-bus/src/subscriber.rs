//! # Subscription Handle
//!
//! The receiving side of the bus. A `Subscription` owns its queue and its
//! cancellation token; dropping it deregisters it.

use crate::publisher::BusInner;
use crate::topic::{SubscriptionId, Topic};
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

/// Errors from non-blocking receive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The subscription was cancelled (unsubscribed or bus shut down).
    #[error("subscription cancelled")]
    Cancelled,

    /// The sending side is gone.
    #[error("subscription channel closed")]
    Closed,
}

/// A live registration on one topic.
pub struct Subscription<M> {
    id: SubscriptionId,
    topic: Topic,
    receiver: mpsc::UnboundedReceiver<M>,
    token: CancellationToken,
    bus: Weak<BusInner<M>>,
}

impl<M> Subscription<M> {
    pub(crate) fn new(
        id: SubscriptionId,
        topic: Topic,
        receiver: mpsc::UnboundedReceiver<M>,
        token: CancellationToken,
        bus: Weak<BusInner<M>>,
    ) -> Self {
        Self {
            id,
            topic,
            receiver,
            token,
            bus,
        }
    }

    /// This subscription's id, as accepted by `MessageBus::unsubscribe`.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The topic this subscription listens on.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// A clone of the cancellation signal scoped to this subscription.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// True once the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the next message.
    ///
    /// Returns `None` once the subscription is cancelled, even if messages
    /// were still buffered.
    pub async fn recv(&mut self) -> Option<M> {
        let message = tokio::select! {
            biased;
            _ = self.token.cancelled() => return None,
            message = self.receiver.recv() => message,
        };
        // A cancel that raced the receive wins.
        if self.token.is_cancelled() {
            return None;
        }
        message
    }

    /// Take the next buffered message without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - a message was buffered
    /// - `Ok(None)` - nothing buffered yet
    /// - `Err(SubscriptionError::Cancelled)` - unsubscribed
    /// - `Err(SubscriptionError::Closed)` - the bus dropped this subscriber
    pub fn try_recv(&mut self) -> Result<Option<M>, SubscriptionError> {
        if self.token.is_cancelled() {
            return Err(SubscriptionError::Cancelled);
        }
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    /// Cancel and deregister this subscription.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl<M> std::fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        } else {
            self.token.cancel();
        }
    }
}

impl<M> Stream for Subscription<M> {
    type Item = M;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }
        // Deregistration drops the only sender, which wakes this receiver.
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(_)) if self.token.is_cancelled() => Poll::Ready(None),
            other => other,
        }
    }
}
