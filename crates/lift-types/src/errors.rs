//! # Error Types
//!
//! Errors raised by a single lift or by parsing lift identities.

use thiserror::Error;

/// Errors from lift configuration and floor requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiftError {
    /// The configuration cannot describe a working lift.
    #[error("invalid lift configuration: {0}")]
    InvalidConfig(String),

    /// A floor request lies outside the lift's shaft.
    #[error("floor {floor} is outside [{lowest}, {highest}]")]
    FloorOutOfRange {
        floor: i32,
        lowest: i32,
        highest: i32,
    },

    /// A string did not parse as a lift id.
    #[error("invalid lift id: {0:?}")]
    InvalidId(String),
}
