//! # Topic Naming
//!
//! | Topic | Carries |
//! |-------|---------|
//! | `lift:<id>` | Motion events of one lift |
//! | `lifts` | `LiftAdded` / `LiftDeleted` for a whole registry |
//! | `fleet:<uuid>` | One global fleet view (bridged motion events) |

use crate::entities::LiftId;
use lift_bus::Topic;
use uuid::Uuid;

/// Name of the fleet lifecycle topic.
pub const LIFECYCLE_TOPIC: &str = "lifts";

/// Private motion topic of one lift.
#[must_use]
pub fn lift_topic(id: LiftId) -> Topic {
    Topic::new(format!("lift:{}", id.get()))
}

/// The fleet lifecycle topic.
#[must_use]
pub fn lifecycle_topic() -> Topic {
    Topic::new(LIFECYCLE_TOPIC)
}

/// Topic of one global fleet view.
#[must_use]
pub fn fleet_view_topic(view: Uuid) -> Topic {
    Topic::new(format!("fleet:{view}"))
}
