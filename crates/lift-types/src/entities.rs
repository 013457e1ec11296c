//! # Core Domain Entities
//!
//! Identity, configuration and point-in-time views of a lift.

use crate::errors::LiftError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identity of a lift within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiftId(pub u64);

impl LiftId {
    /// The raw numeric id.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lift-{}", self.0)
    }
}

impl std::str::FromStr for LiftId {
    type Err = LiftError;

    /// Accepts both `"7"` and `"lift-7"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("lift-").unwrap_or(s);
        digits
            .parse::<u64>()
            .map(LiftId)
            .map_err(|_| LiftError::InvalidId(s.to_string()))
    }
}

/// Hands out lift identities.
///
/// Owned by a registry rather than shared process-wide, so two fleets never
/// couple through hidden state. Safe to call from any number of tasks.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Allocator whose first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Allocator whose first id is `first`.
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Allocate the next id.
    pub fn allocate(&self) -> LiftId {
        LiftId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters for a new lift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftConfig {
    /// Lowest servable floor (inclusive).
    pub lowest_floor: i32,
    /// Highest servable floor (inclusive).
    pub highest_floor: i32,
    /// Starting floor.
    pub current_floor: i32,
    /// Travel speed. One floor takes `1 / floors_per_second` seconds.
    pub floors_per_second: u32,
    /// How long the doors stay open on arrival.
    pub door_close_wait_ms: u64,
}

impl Default for LiftConfig {
    fn default() -> Self {
        Self {
            lowest_floor: 0,
            highest_floor: 10,
            current_floor: 0,
            floors_per_second: 1,
            door_close_wait_ms: 1000,
        }
    }
}

impl LiftConfig {
    /// Check that the bounds are ordered, the start floor is inside them and
    /// the lift actually moves.
    pub fn validate(&self) -> Result<(), LiftError> {
        if self.lowest_floor > self.highest_floor {
            return Err(LiftError::InvalidConfig(format!(
                "lowest floor {} is above highest floor {}",
                self.lowest_floor, self.highest_floor
            )));
        }
        if !self.serves(self.current_floor) {
            return Err(LiftError::InvalidConfig(format!(
                "starting floor {} is outside [{}, {}]",
                self.current_floor, self.lowest_floor, self.highest_floor
            )));
        }
        if self.floors_per_second == 0 {
            return Err(LiftError::InvalidConfig(
                "floors_per_second must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// True when `floor` lies within `[lowest_floor, highest_floor]`.
    #[must_use]
    pub fn serves(&self, floor: i32) -> bool {
        (self.lowest_floor..=self.highest_floor).contains(&floor)
    }
}

/// Immutable point-in-time view of a lift's public state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftSnapshot {
    pub id: LiftId,
    pub current_floor: i32,
    pub lowest_floor: i32,
    pub highest_floor: i32,
}

/// Direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Direction from `from` toward `to`. Equal floors count as down, which is
    /// harmless since no step is taken.
    #[must_use]
    pub fn toward(from: i32, to: i32) -> Self {
        if to > from {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    /// Floor delta of one step.
    #[must_use]
    pub fn delta(self) -> i32 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

/// Motion state machine of a lift.
///
/// ```text
/// Idle ──dequeue──→ Moving(dir) ──step──→ Moving(dir)
///                        │
///                    at target
///                        ↓
///                     Arrived ──→ DoorsOpen ──wait──→ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiftPhase {
    Idle,
    Moving(Direction),
    Arrived,
    DoorsOpen,
}
