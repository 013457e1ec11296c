//! Single-lift domain: the request queue and the motion state machine.

pub mod lift;
pub mod queue;

pub use lift::Lift;
pub use queue::RequestQueue;
