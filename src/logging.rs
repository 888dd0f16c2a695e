//! Logging setup
//!
//! Logs always go to stdout. If a directory is configured they are also
//! written to daily rolling files there. `RUST_LOG` overrides the configured
//! filter.

use crate::config::LoggingConfig;
use crate::error::{ControllerError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file prefix inside the configured directory
pub const LOG_FILE_PREFIX: &str = "hand-reconfig.log";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped and must be kept
/// alive for as long as file logging is wanted.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(&config.filter)?,
    };

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .try_init()
                .map_err(|e| ControllerError::Config(format!("Failed to install logger: {}", e)))?;
            tracing::info!("Logging to {:?}", directory);
            Ok(Some(guard))
        }
        None => {
            registry
                .try_init()
                .map_err(|e| ControllerError::Config(format!("Failed to install logger: {}", e)))?;
            Ok(None)
        }
    }
}

/// Parse an `EnvFilter` directive string
pub fn parse_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| {
        ControllerError::Config(format!("Invalid log filter '{}': {}", directive, e))
    })
}
