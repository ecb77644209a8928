//! Tracing setup for quill binaries.
//!
//! ```ignore
//! use quill_common::telemetry::{self, TelemetryConfig};
//!
//! telemetry::init(TelemetryConfig::from_env("quill-server"));
//! tracing::info!("server started");
//! ```

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event.
    pub service_name: String,
    /// Console log level (default: INFO, DEBUG in debug builds)
    pub console_level: Level,
    /// Emit newline-delimited JSON instead of the compact human format.
    pub json: bool,
}

impl TelemetryConfig {
    /// Load config from environment variables.
    ///
    /// - `RUST_LOG`: Standard env filter (optional, overrides console_level)
    /// - `LOG_FORMAT=json`: structured output
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };

        Self {
            service_name: service_name.into(),
            console_level,
            json: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
        }
    }
}

/// Install the global subscriber. Call once at startup.
///
/// Returns an error if a subscriber was already installed.
pub fn init(config: TelemetryConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.as_str().to_lowercase()));

    let console_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_filter(env_filter)
            .boxed()
    };

    tracing_subscriber::registry().with(console_layer).try_init()?;

    tracing::debug!(service = %config.service_name, json = config.json, "telemetry initialized");
    Ok(())
}
