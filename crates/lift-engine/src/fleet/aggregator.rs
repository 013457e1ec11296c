//! # Aggregator
//!
//! A fleet-wide feed that follows membership. Unlike a
//! [`FleetManager`](super::FleetManager) subscription, lifts added after the
//! aggregator starts are bridged too, and deleted lifts stop contributing.
//!
//! ## Tasks
//!
//! ```text
//!           lifts (lifecycle) ──→ listener ──┐ LiftAdded / LiftDeleted
//!                                   │        │
//!                         bridge / unbridge  ▼
//! lift:N ──bridge──────────────────────→ motion channel ──→ forwarder ──→ sink
//! ```
//!
//! - The **listener** subscribes to the lifecycle topic and lists the
//!   registered lifts in one step, then bridges the listed lifts. Those are
//!   never reported as added.
//! - Any later lift arrives as `LiftAdded`, which the listener pushes into the
//!   motion channel before it bridges the lift, so the sink sees the addition
//!   before any of its motion.
//! - On `LiftDeleted` the bridge is cancelled first, then the event is pushed.
//! - The **forwarder** is the only writer to the sink. It drops motion of
//!   lifts it has already reported deleted; ids are never reused.
//!
//! ## Readiness
//!
//! [`Aggregator::start`] waits on a three-party barrier with the listener and
//! the forwarder, so once it returns the lifecycle subscription is held, the
//! lifts listed with it are bridged and the sink is being fed.
//!
//! Failures never panic. They are reported on the error channel.

use super::bridge::spawn_bridge;
use super::repository::LiftRepository;
use crate::domain::Lift;
use crate::error::FleetError;
use lift_types::{LiftEvent, LiftId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Barrier};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// State shared by the aggregator handle and its tasks.
struct Shared {
    repo: Arc<LiftRepository>,
    bridges: Mutex<HashMap<LiftId, CancellationToken>>,
    motion: mpsc::UnboundedSender<LiftEvent>,
    errors: mpsc::UnboundedSender<FleetError>,
    token: CancellationToken,
    tracker: TaskTracker,
}

/// Merges every lift's events, plus membership changes, into one sink.
pub struct Aggregator {
    shared: Arc<Shared>,
}

impl Aggregator {
    /// Start aggregating `repo` into `sink`.
    ///
    /// Returns once the lifecycle listener and the sink forwarder are running
    /// and every lift registered at that point is bridged.
    pub async fn start(
        repo: Arc<LiftRepository>,
        sink: mpsc::Sender<LiftEvent>,
        errors: mpsc::UnboundedSender<FleetError>,
    ) -> Self {
        let token = repo.token().child_token();
        let (motion_tx, motion_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            repo,
            bridges: Mutex::new(HashMap::new()),
            motion: motion_tx,
            errors,
            token: token.clone(),
            tracker: TaskTracker::new(),
        });

        let ready = Arc::new(Barrier::new(3));
        shared
            .tracker
            .spawn(forward(motion_rx, sink, token, Arc::clone(&ready)));
        shared
            .tracker
            .spawn(Arc::clone(&shared).listen(Arc::clone(&ready)));
        ready.wait().await;

        info!(lifts = shared.bridge_count(), "Aggregator started");

        Self { shared }
    }

    /// Lifts currently bridged into the sink, ascending.
    #[must_use]
    pub fn bridged_lifts(&self) -> Vec<LiftId> {
        let mut ids: Vec<_> = self.shared.bridges.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.shared.token.is_cancelled()
    }

    /// Stop every task and release every subscription.
    pub async fn shutdown(&self) {
        self.shared.token.cancel();
        self.shared.bridges.lock().clear();
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        info!("Aggregator shut down");
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        self.shared.token.cancel();
    }
}

impl Shared {
    fn bridge_count(&self) -> usize {
        self.bridges.lock().len()
    }

    fn report(&self, err: FleetError) {
        warn!(error = %err, "Aggregator error");
        // A caller that dropped its receiver has opted out of errors.
        let _ = self.errors.send(err);
    }

    /// Bridge `lift` unless it is already bridged.
    ///
    /// Only the listener calls this, so a deletion racing the bridge is still
    /// queued on the lifecycle feed and will unbridge it.
    fn bridge(&self, lift: &Arc<Lift>) {
        let id = lift.id();
        let mut bridges = self.bridges.lock();
        if bridges.contains_key(&id) || self.token.is_cancelled() {
            return;
        }

        let source = match lift.subscribe() {
            Ok(source) => source,
            Err(err) => {
                drop(bridges);
                self.report(err.into());
                return;
            }
        };

        let stop = self.token.child_token();
        let motion = self.motion.clone();
        spawn_bridge(&self.tracker, source, stop.clone(), move |event| {
            motion.send(event).is_ok()
        });
        bridges.insert(id, stop);
        debug!(lift_id = %id, "Lift bridged");
    }

    fn unbridge(&self, id: LiftId) {
        if let Some(stop) = self.bridges.lock().remove(&id) {
            stop.cancel();
            debug!(lift_id = %id, "Lift unbridged");
        }
    }

    /// Follow the lifecycle topic.
    async fn listen(self: Arc<Self>, ready: Arc<Barrier>) {
        let subscription = match self.repo.subscribe_lifecycle_with_lifts() {
            Ok((lifecycle, lifts)) => {
                for lift in &lifts {
                    self.bridge(lift);
                }
                Some(lifecycle)
            }
            Err(err) => {
                self.report(err.into());
                // Membership is not followed, but current lifts still feed the sink.
                for lift in self.repo.lifts() {
                    self.bridge(&lift);
                }
                None
            }
        };
        ready.wait().await;

        let Some(mut lifecycle) = subscription else {
            return;
        };

        loop {
            let event = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                event = lifecycle.recv() => event,
            };
            let Some(event) = event else {
                break;
            };

            match event {
                LiftEvent::LiftAdded { lift_id, .. } => {
                    if self.motion.send(event).is_err() {
                        break;
                    }
                    match self.repo.get_lift(lift_id) {
                        Some(lift) => self.bridge(&lift),
                        None => self.report(FleetError::UnknownLift(lift_id)),
                    }
                }
                LiftEvent::LiftDeleted { lift_id } => {
                    self.unbridge(lift_id);
                    if self.motion.send(event).is_err() {
                        break;
                    }
                }
                other => {
                    debug!(event_type = other.event_type(), "Ignoring non-lifecycle event");
                }
            }
        }

        debug!("Lifecycle listener stopped");
    }
}

/// Sole writer to the sink.
async fn forward(
    mut motion: mpsc::UnboundedReceiver<LiftEvent>,
    sink: mpsc::Sender<LiftEvent>,
    token: CancellationToken,
    ready: Arc<Barrier>,
) {
    ready.wait().await;
    // One entry per deleted lift for the life of the aggregator. Ids are never
    // reused, so an entry can never be retired safely.
    let mut deleted = HashSet::new();

    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            event = motion.recv() => event,
        };
        let Some(event) = event else {
            break;
        };

        let lift_id = event.lift_id();
        if deleted.contains(&lift_id) {
            continue;
        }
        if matches!(event, LiftEvent::LiftDeleted { .. }) {
            deleted.insert(lift_id);
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            sent = sink.send(event) => {
                if sent.is_err() {
                    debug!("Sink closed, forwarder stopping");
                    break;
                }
            }
        }
    }

    debug!("Sink forwarder stopped");
}
