//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// How the process logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// Service name reported once in the startup event
    pub service_name: String,

    /// Filter directive (trace, debug, info, warn, error, or `EnvFilter` syntax)
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to use ANSI colours in human-readable output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "lift-fleet".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LIFT_SERVICE_NAME`: Service name (default: lift-fleet)
    /// - `LIFT_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `LIFT_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `NO_COLOR`: Disable ANSI colours when set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`TelemetryConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("LIFT_SERVICE_NAME").unwrap_or_else(|| "lift-fleet".to_string()),

            log_level: lookup("LIFT_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),

            json_logs: lookup("LIFT_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            ansi: lookup("NO_COLOR").is_none(),
        }
    }

    /// Configuration for tests: debug level, plain output.
    pub fn for_tests() -> Self {
        Self {
            service_name: "lift-fleet-test".to_string(),
            log_level: "debug".to_string(),
            json_logs: false,
            ansi: false,
        }
    }
}
