//! Fleet configuration from environment variables.

use lift_bus::BusConfig;
use lift_types::LiftConfig;
use std::env;
use std::str::FromStr;

/// Settings shared by every lift a fleet creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FleetConfig {
    /// Tuning for the fleet's message bus.
    pub bus: BusConfig,

    /// Template for lifts added without an explicit configuration.
    pub default_lift: LiftConfig,
}

impl FleetConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LIFT_MAX_SUBSCRIBERS`: Subscribers allowed per topic (default: 1024)
    /// - `LIFT_DEFAULT_FLOORS_PER_SECOND`: Travel speed (default: 1)
    /// - `LIFT_DEFAULT_DOOR_WAIT_MS`: Door dwell in milliseconds (default: 1000)
    /// - `LIFT_DEFAULT_LOWEST_FLOOR`: Lowest floor (default: 0)
    /// - `LIFT_DEFAULT_HIGHEST_FLOOR`: Highest floor (default: 10)
    ///
    /// Unparseable values fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`FleetConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str, fallback| parse_or(lookup(key), fallback);

        Self {
            bus: BusConfig {
                max_subscribers_per_topic: read_usize(
                    lookup("LIFT_MAX_SUBSCRIBERS"),
                    defaults.bus.max_subscribers_per_topic,
                ),
            },
            default_lift: LiftConfig {
                lowest_floor: read("LIFT_DEFAULT_LOWEST_FLOOR", defaults.default_lift.lowest_floor),
                highest_floor: read(
                    "LIFT_DEFAULT_HIGHEST_FLOOR",
                    defaults.default_lift.highest_floor,
                ),
                current_floor: defaults.default_lift.current_floor,
                floors_per_second: parse_or(
                    lookup("LIFT_DEFAULT_FLOORS_PER_SECOND"),
                    defaults.default_lift.floors_per_second,
                ),
                door_close_wait_ms: parse_or(
                    lookup("LIFT_DEFAULT_DOOR_WAIT_MS"),
                    defaults.default_lift.door_close_wait_ms,
                ),
            },
        }
        .with_start_floor_clamped()
    }

    /// Keep the template's starting floor inside its own bounds.
    fn with_start_floor_clamped(mut self) -> Self {
        let lift = &mut self.default_lift;
        if lift.lowest_floor <= lift.highest_floor {
            lift.current_floor = lift.current_floor.clamp(lift.lowest_floor, lift.highest_floor);
        }
        self
    }
}

fn parse_or<T: FromStr>(value: Option<String>, fallback: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(fallback)
}

fn read_usize(value: Option<String>, fallback: usize) -> usize {
    match parse_or(value, fallback) {
        0 => fallback,
        n => n,
    }
}
