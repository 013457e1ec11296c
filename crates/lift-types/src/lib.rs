//! # Lift Types Crate
//!
//! Domain entities and events shared by the engine and by anything that
//! observes a fleet.
//!
//! ## Design Principles
//!
//! - **Closed event set**: `LiftEvent` is an enum; adapters never inspect
//!   payload types at runtime.
//! - **Owned identity**: `IdAllocator` belongs to a registry, never to the
//!   process.
//! - **Validated configuration**: a `LiftConfig` that fails `validate()` never
//!   becomes a lift.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod topics;

pub use entities::*;
pub use envelope::LiftMessage;
pub use errors::*;
pub use events::LiftEvent;
pub use topics::*;
