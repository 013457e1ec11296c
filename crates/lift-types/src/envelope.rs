//! # `LiftMessage` Envelope
//!
//! The shape transport adapters put on the wire:
//!
//! ```json
//! { "liftId": 1, "type": "lift_arrived", "payload": { "liftId": 1, "floor": 2 } }
//! ```
//!
//! The engine never encodes; adapters call [`LiftMessage::from_event`] at the
//! transport boundary.

use crate::entities::LiftId;
use crate::events::LiftEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire envelope for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftMessage {
    /// The lift the event belongs to.
    pub lift_id: LiftId,

    /// Stable tag, e.g. `lift_transited`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Variant body with camelCase fields.
    pub payload: Value,
}

impl LiftMessage {
    /// Build the envelope for `event`.
    pub fn from_event(event: &LiftEvent) -> Result<Self, serde_json::Error> {
        let mut encoded = serde_json::to_value(event)?;
        let payload = encoded
            .get_mut("payload")
            .map(Value::take)
            .unwrap_or(Value::Null);

        Ok(Self {
            lift_id: event.lift_id(),
            event_type: event.event_type().to_string(),
            payload,
        })
    }

    /// Encode as a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
