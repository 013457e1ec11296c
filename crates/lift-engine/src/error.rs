//! # Fleet Errors
//!
//! One error type for every fleet operation. Bus and lift errors pass through
//! unchanged so callers can still match on the underlying cause.

use lift_bus::BusError;
use lift_types::{LiftError, LiftId};
use thiserror::Error;

/// Errors from the repository, the fleet manager and the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FleetError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Lift(#[from] LiftError),

    /// No lift with this id is registered.
    #[error("unknown lift: {0}")]
    UnknownLift(LiftId),

    /// The fleet has been shut down.
    #[error("fleet is shut down")]
    ShutDown,
}

/// Result alias for fleet operations.
pub type FleetResult<T> = Result<T, FleetError>;
