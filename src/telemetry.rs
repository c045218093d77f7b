//! Logging setup
//!
//! Structured logging via `tracing`, filtered by `RUST_LOG` when set and
//! by the configured default level otherwise.

use tracing_subscriber::EnvFilter;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default log level filter when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable output
    pub json_format: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_format: false,
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let log_level = std::env::var("LABELER_LOG").unwrap_or_else(|_| "info".to_string());
        let json_format = std::env::var("LABELER_LOG_JSON")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(false);
        Self {
            log_level,
            json_format,
        }
    }
}

/// Initialize the global subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init_telemetry(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json_format {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
