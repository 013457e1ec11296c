//! Pending floor requests.
//!
//! FIFO order with set semantics: a floor is held at most once. The queue is
//! not synchronized itself; it lives inside the lift's state lock so the
//! duplicate check and the insert are one step.

use std::collections::VecDeque;

/// Ordered, duplicate-free sequence of floors awaiting a visit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQueue {
    floors: VecDeque<i32>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `floor` unless it is already waiting. Returns false on a
    /// duplicate.
    pub fn push(&mut self, floor: i32) -> bool {
        if self.floors.contains(&floor) {
            return false;
        }
        self.floors.push_back(floor);
        true
    }

    /// Remove and return the earliest request.
    pub fn pop(&mut self) -> Option<i32> {
        self.floors.pop_front()
    }

    /// Copy of the waiting floors, earliest first.
    pub fn to_vec(&self) -> Vec<i32> {
        self.floors.iter().copied().collect()
    }
}
