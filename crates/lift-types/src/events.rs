//! # Lift Events
//!
//! Every state change a lift or a fleet goes through. The set is closed: the
//! wire tag of each variant is fixed by serde and mirrored by
//! [`LiftEvent::event_type`].

use crate::entities::{LiftId, LiftSnapshot};
use serde::{Deserialize, Serialize};

/// An observable lift or fleet event. Each variant names its owning lift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum LiftEvent {
    // =========================================================================
    // MOTION (published on the lift's own topic)
    // =========================================================================
    /// A floor request was accepted into the queue.
    LiftCalled { lift_id: LiftId, floor: i32 },

    /// The lift moved one floor.
    LiftTransited { lift_id: LiftId, from: i32, to: i32 },

    /// The lift reached a requested floor.
    LiftArrived { lift_id: LiftId, floor: i32 },

    LiftDoorsOpened { lift_id: LiftId, floor: i32 },

    LiftDoorsClosed { lift_id: LiftId, floor: i32 },

    // =========================================================================
    // LIFECYCLE (published on the fleet lifecycle topic)
    // =========================================================================
    /// A lift joined the fleet.
    LiftAdded {
        lift_id: LiftId,
        snapshot: LiftSnapshot,
    },

    /// A lift was removed from the fleet.
    LiftDeleted { lift_id: LiftId },
}

impl LiftEvent {
    /// The lift this event belongs to.
    #[must_use]
    pub fn lift_id(&self) -> LiftId {
        match self {
            Self::LiftCalled { lift_id, .. }
            | Self::LiftTransited { lift_id, .. }
            | Self::LiftArrived { lift_id, .. }
            | Self::LiftDoorsOpened { lift_id, .. }
            | Self::LiftDoorsClosed { lift_id, .. }
            | Self::LiftAdded { lift_id, .. }
            | Self::LiftDeleted { lift_id } => *lift_id,
        }
    }

    /// Stable wire tag of this variant.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::LiftCalled { .. } => "lift_called",
            Self::LiftTransited { .. } => "lift_transited",
            Self::LiftArrived { .. } => "lift_arrived",
            Self::LiftDoorsOpened { .. } => "lift_doors_opened",
            Self::LiftDoorsClosed { .. } => "lift_doors_closed",
            Self::LiftAdded { .. } => "lift_added",
            Self::LiftDeleted { .. } => "lift_deleted",
        }
    }

    /// The floor the event concerns, if any. Transits report their
    /// destination floor.
    #[must_use]
    pub fn floor(&self) -> Option<i32> {
        match self {
            Self::LiftCalled { floor, .. }
            | Self::LiftArrived { floor, .. }
            | Self::LiftDoorsOpened { floor, .. }
            | Self::LiftDoorsClosed { floor, .. } => Some(*floor),
            Self::LiftTransited { to, .. } => Some(*to),
            Self::LiftAdded { snapshot, .. } => Some(snapshot.current_floor),
            Self::LiftDeleted { .. } => None,
        }
    }

    /// True for fleet membership events.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::LiftAdded { .. } | Self::LiftDeleted { .. })
    }
}
