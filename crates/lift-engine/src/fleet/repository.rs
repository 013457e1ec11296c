//! # Lift Repository
//!
//! The fleet's registry of lifts. Owns the message bus, the id allocator and
//! the supervision scope of every motion loop.
//!
//! ## Lifecycle Feed
//!
//! Membership changes are published on the `lifts` topic while the registry
//! write lock is held, so the feed order always matches the registry order:
//!
//! | Operation       | Event         |
//! |-----------------|---------------|
//! | `add_lift()`    | `LiftAdded`   |
//! | `delete_lift()` | `LiftDeleted` |
//!
//! Lock order: registry → lift state → bus.

use crate::config::FleetConfig;
use crate::domain::Lift;
use crate::error::{FleetError, FleetResult};
use lift_bus::{BusError, MessageBus, Subscription};
use lift_types::{lifecycle_topic, IdAllocator, LiftConfig, LiftEvent, LiftId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Registry of lifts keyed by id.
pub struct LiftRepository {
    bus: MessageBus<LiftEvent>,
    lifts: RwLock<BTreeMap<LiftId, Arc<Lift>>>,
    ids: IdAllocator,
    default_lift: LiftConfig,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl LiftRepository {
    /// Empty repository with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&FleetConfig::default())
    }

    #[must_use]
    pub fn with_config(config: &FleetConfig) -> Self {
        Self {
            bus: MessageBus::with_config(config.bus),
            lifts: RwLock::new(BTreeMap::new()),
            ids: IdAllocator::new(),
            default_lift: config.default_lift,
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Validate `config`, register a new lift and announce it.
    ///
    /// The lift is not started.
    pub fn add_lift(&self, config: LiftConfig) -> FleetResult<Arc<Lift>> {
        if self.token.is_cancelled() {
            return Err(FleetError::ShutDown);
        }
        config.validate()?;

        let mut lifts = self.lifts.write();
        // Allocated under the lock so id order is registration order.
        let id = self.ids.allocate();
        let lift = Lift::supervised(
            id,
            config,
            self.bus.clone(),
            self.token.child_token(),
            self.tracker.clone(),
        )?;
        lifts.insert(id, Arc::clone(&lift));

        let receivers = self.bus.publish(
            &lifecycle_topic(),
            LiftEvent::LiftAdded {
                lift_id: id,
                snapshot: lift.state(),
            },
        );
        drop(lifts);

        info!(lift_id = %id, floor = config.current_floor, receivers, "Lift added");
        Ok(lift)
    }

    /// Register a lift built from the default template.
    pub fn add_default_lift(&self) -> FleetResult<Arc<Lift>> {
        self.add_lift(self.default_lift)
    }

    #[must_use]
    pub fn get_lift(&self, id: LiftId) -> Option<Arc<Lift>> {
        self.lifts.read().get(&id).cloned()
    }

    /// Every registered lift in registration order.
    #[must_use]
    pub fn lifts(&self) -> Vec<Arc<Lift>> {
        self.lifts.read().values().cloned().collect()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<LiftId> {
        self.lifts.read().keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lifts.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lifts.read().is_empty()
    }

    /// Remove a lift, announce the removal and stop its motion loop.
    ///
    /// Returns false for an unknown id.
    pub fn delete_lift(&self, id: LiftId) -> bool {
        let lift = {
            let mut lifts = self.lifts.write();
            let Some(lift) = lifts.remove(&id) else {
                debug!(lift_id = %id, "Delete of unknown lift ignored");
                return false;
            };
            self.bus
                .publish(&lifecycle_topic(), LiftEvent::LiftDeleted { lift_id: id });
            lift
        };

        lift.stop();
        info!(lift_id = %id, "Lift deleted");
        true
    }

    /// Start a registered lift's motion loop. False if unknown or already
    /// running.
    pub fn start_lift(&self, id: LiftId) -> bool {
        self.get_lift(id).is_some_and(|lift| lift.start())
    }

    /// Subscribe to `LiftAdded` / `LiftDeleted`.
    pub fn subscribe_lifecycle(&self) -> Result<Subscription<LiftEvent>, BusError> {
        self.bus.subscribe(lifecycle_topic())
    }

    /// Subscribe to the lifecycle topic and list the registered lifts in one
    /// step.
    ///
    /// Additions and deletions publish under the registry write lock, so every
    /// listed lift has its `LiftAdded` behind the subscription and every lift
    /// missing from the list will be announced on it.
    pub fn subscribe_lifecycle_with_lifts(
        &self,
    ) -> Result<(Subscription<LiftEvent>, Vec<Arc<Lift>>), BusError> {
        let lifts = self.lifts.read();
        let feed = self.bus.subscribe(lifecycle_topic())?;
        Ok((feed, lifts.values().cloned().collect()))
    }

    /// The bus every lift of this repository publishes on.
    #[must_use]
    pub fn bus(&self) -> &MessageBus<LiftEvent> {
        &self.bus
    }

    /// Template used by [`LiftRepository::add_default_lift`].
    #[must_use]
    pub fn default_lift(&self) -> LiftConfig {
        self.default_lift
    }

    /// Parent of every motion loop's token. Fleet components derive their
    /// own scopes from it.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop every motion loop, wait for them to exit, then close the bus.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.bus.shutdown();
        info!(lifts = self.len(), "Lift repository shut down");
    }
}

impl Default for LiftRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LiftRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiftRepository")
            .field("lifts", &self.ids())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
