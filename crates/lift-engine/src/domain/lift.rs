//! # Lift
//!
//! One lift's state machine, request queue and motion loop.
//!
//! ## Motion Loop
//!
//! ```text
//! loop {
//!     cancelled?            → exit
//!     queue empty?          → wait for a call (or cancellation)
//!     dequeue target
//!     while floor != target → sleep 1/speed, step one floor, LiftTransited
//!     LiftArrived, LiftDoorsOpened, wait door_close_wait_ms, LiftDoorsClosed
//! }
//! ```
//!
//! ## Cancellation Granularity
//!
//! Cancellation is observed at the top of every iteration and between floor
//! steps. A floor step (sleep, advance, publish) always completes once begun,
//! so a stopped lift is always exactly at a floor. The door dwell does race
//! cancellation; the doors are still reported closed before the loop exits.
//!
//! ## Event Ordering
//!
//! Every event is published while the lift's state lock is held. Publishing
//! never blocks (see `lift-bus`), and the lock fixes one total order per lift:
//! a `LiftCalled` is always published before the motion loop can dequeue the
//! floor it announces.

use lift_bus::{BusError, MessageBus, Subscription, SubscriptionId, Topic};
use lift_types::{
    lift_topic, Direction, LiftConfig, LiftError, LiftEvent, LiftId, LiftPhase, LiftSnapshot,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use super::queue::RequestQueue;

/// Mutable state, guarded by one lock.
#[derive(Debug)]
struct LiftState {
    current_floor: i32,
    phase: LiftPhase,
    requests: RequestQueue,
}

/// A simulated lift.
///
/// Shared as `Arc<Lift>`. Calls may come from any number of tasks; only the
/// motion loop moves the lift.
pub struct Lift {
    id: LiftId,
    config: LiftConfig,
    topic: Topic,
    bus: MessageBus<LiftEvent>,
    state: Mutex<LiftState>,
    /// Wakes an idle motion loop. Stores a permit if nobody is waiting yet.
    work: Notify,
    token: CancellationToken,
    tracker: TaskTracker,
    running: AtomicBool,
    motion: Mutex<Option<JoinHandle<()>>>,
}

impl Lift {
    /// Create a standalone lift with its own cancellation scope.
    pub fn new(
        id: LiftId,
        config: LiftConfig,
        bus: MessageBus<LiftEvent>,
    ) -> Result<Arc<Self>, LiftError> {
        Self::supervised(id, config, bus, CancellationToken::new(), TaskTracker::new())
    }

    /// Create a lift whose motion loop is cancelled by `token` and tracked by
    /// `tracker`. Used by registries that join all loops on shutdown.
    pub fn supervised(
        id: LiftId,
        config: LiftConfig,
        bus: MessageBus<LiftEvent>,
        token: CancellationToken,
        tracker: TaskTracker,
    ) -> Result<Arc<Self>, LiftError> {
        config.validate()?;

        Ok(Arc::new(Self {
            id,
            config,
            topic: lift_topic(id),
            bus,
            state: Mutex::new(LiftState {
                current_floor: config.current_floor,
                phase: LiftPhase::Idle,
                requests: RequestQueue::new(),
            }),
            work: Notify::new(),
            token,
            tracker,
            running: AtomicBool::new(false),
            motion: Mutex::new(None),
        }))
    }

    #[must_use]
    pub fn id(&self) -> LiftId {
        self.id
    }

    #[must_use]
    pub fn config(&self) -> &LiftConfig {
        &self.config
    }

    /// This lift's private motion topic.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Request a visit to `floor`.
    ///
    /// Returns true if the floor was newly queued, false if it was already
    /// waiting or lies outside the shaft. Never waits for the lift to move.
    pub fn call(&self, floor: i32) -> bool {
        match self.try_call(floor) {
            Ok(queued) => queued,
            Err(err) => {
                warn!(lift_id = %self.id, floor, error = %err, "Call rejected");
                false
            }
        }
    }

    /// Like [`Lift::call`], but reports out-of-range floors as an error.
    ///
    /// # Errors
    ///
    /// `LiftError::FloorOutOfRange` when `floor` is outside
    /// `[lowest_floor, highest_floor]`.
    pub fn try_call(&self, floor: i32) -> Result<bool, LiftError> {
        if !self.config.serves(floor) {
            return Err(LiftError::FloorOutOfRange {
                floor,
                lowest: self.config.lowest_floor,
                highest: self.config.highest_floor,
            });
        }

        {
            let mut state = self.state.lock();
            if !state.requests.push(floor) {
                debug!(lift_id = %self.id, floor, "Duplicate call ignored");
                return Ok(false);
            }
            self.publish(LiftEvent::LiftCalled {
                lift_id: self.id,
                floor,
            });
        }

        self.work.notify_one();
        debug!(lift_id = %self.id, floor, "Floor queued");
        Ok(true)
    }

    /// Spawn the motion loop. Returns false if it is already running or the
    /// lift has been stopped.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let handle = self.tracker.spawn(Arc::clone(self).run());
        *self.motion.lock() = Some(handle);
        true
    }

    /// Signal the motion loop to stop at the next step boundary.
    ///
    /// A stopped lift cannot be restarted.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stop the motion loop and wait for it to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.motion.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(lift_id = %self.id, error = %err, "Motion loop ended abnormally");
            }
        }
    }

    /// True while the motion loop is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Point-in-time view of the public state.
    #[must_use]
    pub fn state(&self) -> LiftSnapshot {
        let state = self.state.lock();
        LiftSnapshot {
            id: self.id,
            current_floor: state.current_floor,
            lowest_floor: self.config.lowest_floor,
            highest_floor: self.config.highest_floor,
        }
    }

    #[must_use]
    pub fn phase(&self) -> LiftPhase {
        self.state.lock().phase
    }

    /// Floors still waiting, earliest first.
    #[must_use]
    pub fn pending(&self) -> Vec<i32> {
        self.state.lock().requests.to_vec()
    }

    /// Subscribe to this lift's motion events.
    pub fn subscribe(&self) -> Result<Subscription<LiftEvent>, BusError> {
        self.bus.subscribe(&self.topic)
    }

    /// Cancel a subscription made with [`Lift::subscribe`]. Idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Time to travel one floor.
    fn step_duration(&self) -> Duration {
        Duration::from_secs(1) / self.config.floors_per_second
    }

    /// Caller must hold the state lock.
    fn publish(&self, event: LiftEvent) {
        let receivers = self.bus.publish(&self.topic, event);
        trace!(lift_id = %self.id, receivers, "Lift event published");
    }

    async fn run(self: Arc<Self>) {
        info!(lift_id = %self.id, "Motion loop started");

        loop {
            if self.token.is_cancelled() {
                break;
            }

            let next = self.state.lock().requests.pop();
            let Some(target) = next else {
                tokio::select! {
                    _ = self.token.cancelled() => break,
                    _ = self.work.notified() => {}
                }
                continue;
            };

            if !self.travel_to(target).await {
                break;
            }
            if !self.serve(target).await {
                break;
            }
        }

        self.state.lock().phase = LiftPhase::Idle;
        self.running.store(false, Ordering::Release);
        info!(lift_id = %self.id, "Motion loop stopped");
    }

    /// Step floor by floor toward `target`. Returns false if cancelled
    /// between steps.
    async fn travel_to(&self, target: i32) -> bool {
        let step = self.step_duration();

        loop {
            let direction = {
                let mut state = self.state.lock();
                if state.current_floor == target {
                    return true;
                }
                let direction = Direction::toward(state.current_floor, target);
                state.phase = LiftPhase::Moving(direction);
                direction
            };

            if self.token.is_cancelled() {
                debug!(lift_id = %self.id, target, "Travel cancelled between floors");
                return false;
            }

            // One floor of travel. Never interrupted once begun.
            tokio::time::sleep(step).await;

            let mut state = self.state.lock();
            let from = state.current_floor;
            let to = from + direction.delta();
            state.current_floor = to;
            self.publish(LiftEvent::LiftTransited {
                lift_id: self.id,
                from,
                to,
            });
        }
    }

    /// Arrive at `floor` and cycle the doors. Returns false if cancelled
    /// during the door dwell.
    async fn serve(&self, floor: i32) -> bool {
        {
            let mut state = self.state.lock();
            state.phase = LiftPhase::Arrived;
            self.publish(LiftEvent::LiftArrived {
                lift_id: self.id,
                floor,
            });
            state.phase = LiftPhase::DoorsOpen;
            self.publish(LiftEvent::LiftDoorsOpened {
                lift_id: self.id,
                floor,
            });
        }
        info!(lift_id = %self.id, floor, "Arrived");

        let wait = Duration::from_millis(self.config.door_close_wait_ms);
        let cancelled = tokio::select! {
            _ = self.token.cancelled() => true,
            _ = tokio::time::sleep(wait) => false,
        };

        if cancelled {
            debug!(lift_id = %self.id, floor, "Stopped with doors open, closing early");
        }

        let mut state = self.state.lock();
        state.phase = LiftPhase::Idle;
        self.publish(LiftEvent::LiftDoorsClosed {
            lift_id: self.id,
            floor,
        });

        !cancelled
    }
}

impl std::fmt::Debug for Lift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lift")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .field("running", &self.is_running())
            .finish()
    }
}
