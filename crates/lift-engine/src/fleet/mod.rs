//! Fleet-level coordination: the lift registry, global subscriptions and the
//! membership-following aggregator.

pub mod aggregator;
mod bridge;
pub mod manager;
pub mod repository;

pub use aggregator::Aggregator;
pub use manager::{FleetManager, FleetSubscription};
pub use repository::LiftRepository;
