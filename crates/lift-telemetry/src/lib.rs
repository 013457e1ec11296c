//! # Lift Telemetry
//!
//! Logging setup for lift fleet binaries and test suites.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lift_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     init_logging(&TelemetryConfig::from_env()).expect("Failed to init logging");
//!     // tracing macros now reach stdout
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LIFT_SERVICE_NAME` | `lift-fleet` | Service name in logs |
//! | `LIFT_LOG_LEVEL` / `RUST_LOG` | `info` | Filter directive |
//! | `LIFT_JSON_LOGS` | `false` | JSON output |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("invalid log filter {0}")]
    InvalidFilter(String),

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Install logging for a test binary. Safe to call from every test; only the
/// first call installs anything.
pub fn init_test_logging() {
    let _ = init_logging(&TelemetryConfig::for_tests());
}
