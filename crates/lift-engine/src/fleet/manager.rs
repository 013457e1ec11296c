//! # Fleet Manager
//!
//! Public face of the fleet: adds lifts, routes calls and hands out global
//! subscriptions that see every lift's motion.
//!
//! ## Global Subscriptions
//!
//! Each global subscription gets its own view topic (`fleet:<uuid>`). One
//! bridge per lift registered at subscribe time republishes that lift's
//! events onto the view topic:
//!
//! ```text
//! lift:1 ──bridge──┐
//! lift:2 ──bridge──┼──→ fleet:<uuid> ──→ FleetSubscription
//! lift:3 ──bridge──┘
//! ```
//!
//! Lifts added afterwards are not bridged into existing views; use the
//! [`Aggregator`](super::Aggregator) for a feed that follows membership.
//!
//! Every view has a token. Unsubscribing, dropping the subscription or
//! shutting the manager down cancels it, which ends all of its bridges.

use super::bridge::spawn_bridge;
use super::repository::LiftRepository;
use crate::config::FleetConfig;
use crate::domain::Lift;
use crate::error::{FleetError, FleetResult};
use lift_bus::{Subscription, SubscriptionId};
use lift_types::{fleet_view_topic, LiftConfig, LiftEvent, LiftId, LiftSnapshot};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A subscription to every lift in the fleet.
pub type FleetSubscription = Subscription<LiftEvent>;

/// Teardown record of one global subscription.
struct View {
    token: CancellationToken,
    bridges: Vec<SubscriptionId>,
}

/// Lift registry plus fan-in subscriptions.
pub struct FleetManager {
    repo: Arc<LiftRepository>,
    views: Mutex<HashMap<SubscriptionId, View>>,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl FleetManager {
    /// Manager over a fresh repository with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&FleetConfig::default())
    }

    #[must_use]
    pub fn with_config(config: &FleetConfig) -> Self {
        Self::with_repository(Arc::new(LiftRepository::with_config(config)))
    }

    /// Manager over an existing repository, e.g. one an aggregator also
    /// watches.
    #[must_use]
    pub fn with_repository(repo: Arc<LiftRepository>) -> Self {
        let token = repo.token().child_token();
        Self {
            repo,
            views: Mutex::new(HashMap::new()),
            token,
            tracker: TaskTracker::new(),
        }
    }

    #[must_use]
    pub fn repository(&self) -> &Arc<LiftRepository> {
        &self.repo
    }

    /// Register a lift. It does not move until started.
    pub fn add_lift(&self, config: LiftConfig) -> FleetResult<Arc<Lift>> {
        self.repo.add_lift(config)
    }

    /// Register a lift from the fleet's default template.
    pub fn add_default_lift(&self) -> FleetResult<Arc<Lift>> {
        self.repo.add_default_lift()
    }

    #[must_use]
    pub fn get_lift(&self, id: LiftId) -> Option<Arc<Lift>> {
        self.repo.get_lift(id)
    }

    pub fn delete_lift(&self, id: LiftId) -> bool {
        self.repo.delete_lift(id)
    }

    /// Request `floor` on lift `id`. False if the lift is unknown, the floor
    /// is already queued or it lies outside the shaft.
    pub fn call_lift(&self, id: LiftId, floor: i32) -> bool {
        match self.repo.get_lift(id) {
            Some(lift) => lift.call(floor),
            None => {
                debug!(lift_id = %id, floor, "Call for unknown lift ignored");
                false
            }
        }
    }

    /// Like [`FleetManager::call_lift`] but says why a call was refused.
    pub fn try_call_lift(&self, id: LiftId, floor: i32) -> FleetResult<bool> {
        let lift = self.repo.get_lift(id).ok_or(FleetError::UnknownLift(id))?;
        Ok(lift.try_call(floor)?)
    }

    pub fn start_lift(&self, id: LiftId) -> bool {
        self.repo.start_lift(id)
    }

    /// Start every registered lift. Returns how many were newly started.
    pub fn start_all(&self) -> usize {
        self.repo.lifts().iter().filter(|lift| lift.start()).count()
    }

    /// Open a subscription to the motion of every lift registered now.
    ///
    /// # Errors
    ///
    /// Any bus error while opening the view or one of its bridges. Everything
    /// opened before the failure is released.
    pub fn subscribe(&self) -> FleetResult<FleetSubscription> {
        if self.token.is_cancelled() {
            return Err(FleetError::ShutDown);
        }
        self.prune();

        let bus = self.repo.bus();
        let topic = fleet_view_topic(Uuid::new_v4());
        let global = bus.subscribe(&topic)?;
        let view_token = self.token.child_token();

        let lifts = self.repo.lifts();
        let mut sources = Vec::with_capacity(lifts.len());
        for lift in &lifts {
            match lift.subscribe() {
                Ok(source) => sources.push(source),
                Err(err) => {
                    warn!(
                        lift_id = %lift.id(),
                        topic = %topic,
                        error = %err,
                        "Bridge subscribe failed, releasing view"
                    );
                    view_token.cancel();
                    // Dropping the opened sources and the view unsubscribes them.
                    return Err(err.into());
                }
            }
        }

        let bridges = sources.iter().map(Subscription::id).collect();
        for source in sources {
            let bus = bus.clone();
            let topic = topic.clone();
            spawn_bridge(&self.tracker, source, view_token.clone(), move |event| {
                bus.publish(&topic, event);
                true
            });
        }
        self.watch_view(global.cancellation_token(), view_token.clone());

        let global_id = global.id();
        self.views.lock().insert(
            global_id,
            View {
                token: view_token,
                bridges,
            },
        );
        info!(subscription_id = %global_id, topic = %topic, lifts = lifts.len(), "Fleet subscription opened");
        Ok(global)
    }

    /// Cancel a global subscription and every bridge feeding it.
    ///
    /// Idempotent: false when the id is unknown or already removed.
    pub fn unsubscribe(&self, global_id: SubscriptionId) -> bool {
        let Some(view) = self.views.lock().remove(&global_id) else {
            return false;
        };
        self.release(global_id, view);
        info!(subscription_id = %global_id, "Fleet subscription closed");
        true
    }

    /// Number of global subscriptions still open.
    #[must_use]
    pub fn open_subscriptions(&self) -> usize {
        self.prune();
        self.views.lock().len()
    }

    /// Snapshot of every lift, keyed by id.
    #[must_use]
    pub fn state(&self) -> BTreeMap<LiftId, LiftSnapshot> {
        self.repo
            .lifts()
            .iter()
            .map(|lift| (lift.id(), lift.state()))
            .collect()
    }

    /// Close every subscription, stop every lift and wait for all tasks.
    pub async fn shutdown(&self) {
        let views: Vec<_> = self.views.lock().drain().collect();
        for (global_id, view) in views {
            self.release(global_id, view);
        }
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.repo.shutdown().await;
        info!("Fleet manager shut down");
    }

    fn release(&self, global_id: SubscriptionId, view: View) {
        view.token.cancel();
        let bus = self.repo.bus();
        for bridge in view.bridges {
            bus.unsubscribe(bridge);
        }
        bus.unsubscribe(global_id);
    }

    /// Tie a view's token to its global subscription, so a subscription that
    /// is dropped without `unsubscribe` still ends its bridges.
    fn watch_view(&self, global: CancellationToken, view: CancellationToken) {
        self.tracker.spawn(async move {
            tokio::select! {
                _ = global.cancelled() => view.cancel(),
                _ = view.cancelled() => {}
            }
        });
    }

    /// Forget views whose subscriber went away without unsubscribing.
    fn prune(&self) {
        let mut views = self.views.lock();
        views.retain(|global_id, view| {
            let live = !view.token.is_cancelled();
            if !live {
                debug!(subscription_id = %global_id, "Pruned abandoned fleet subscription");
            }
            live
        });
    }
}

impl Default for FleetManager {
    fn default() -> Self {
        Self::new()
    }
}
