//! # Lift Engine
//!
//! Lift simulation and fleet coordination on top of `lift-bus`.
//!
//! ## Components
//!
//! | Component        | Responsibility                                        |
//! |------------------|-------------------------------------------------------|
//! | `Lift`           | Request queue, motion loop, per-lift event topic      |
//! | `LiftRepository` | Registry, id allocation, lifecycle feed, supervision  |
//! | `FleetManager`   | Calls, snapshots, fan-in subscriptions                |
//! | `Aggregator`     | Fleet feed that follows lifts being added and removed |
//!
//! ## Supervision
//!
//! ```text
//! LiftRepository token
//!   ├── Lift motion loop tokens
//!   ├── FleetManager token ── view tokens ── bridges
//!   └── Aggregator token ── bridge tokens
//! ```
//!
//! Cancelling a parent stops everything beneath it. Every task runs on a
//! `TaskTracker` and is joined by its owner's `shutdown()`.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod domain;
pub mod error;
pub mod fleet;

pub use config::FleetConfig;
pub use domain::{Lift, RequestQueue};
pub use error::{FleetError, FleetResult};
pub use fleet::{Aggregator, FleetManager, FleetSubscription, LiftRepository};
