//! Bridging subscriptions.
//!
//! A bridge drains one lift's motion topic into somewhere else: a fleet view
//! topic for the manager, the aggregator's motion channel for the aggregator.
//! It is a supervised task that ends when its token is cancelled, when the
//! source subscription is closed, or when the destination refuses an event.
//! The source subscription is dropped with the task, which unsubscribes it.

use lift_bus::Subscription;
use lift_types::LiftEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

/// Spawn a bridge on `tracker`. `forward` returns false to end the bridge.
pub(crate) fn spawn_bridge<F>(
    tracker: &TaskTracker,
    mut source: Subscription<LiftEvent>,
    stop: CancellationToken,
    mut forward: F,
) -> JoinHandle<()>
where
    F: FnMut(LiftEvent) -> bool + Send + 'static,
{
    tracker.spawn(async move {
        let subscription_id = source.id();
        debug!(%subscription_id, topic = %source.topic(), "Bridge started");

        loop {
            let event = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                event = source.recv() => event,
            };
            let Some(event) = event else {
                break;
            };
            trace!(%subscription_id, event_type = event.event_type(), "Bridging event");
            if !forward(event) {
                break;
            }
        }

        debug!(%subscription_id, "Bridge stopped");
    })
}
