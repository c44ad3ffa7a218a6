//! # Structured Logging
//!
//! One global `tracing` subscriber for the pipeline binary, text or JSON.
//! `RUST_LOG` overrides the configured level. Installing the subscriber also
//! installs the `log` bridge, so records from the llm-sdk's `log` macros land
//! in the same output.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};

// Flag to track if logging has been initialized
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, thiserror::Error)]
#[error("failed to initialise logging: {0}")]
pub struct LoggingError(String);

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LoggingError(format!("invalid log level '{}': {}", config.level, e)))?;

    let registry = Registry::default().with(filter);
    let result = match config.format {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_target(true)
                .with_writer(std::io::stderr);
            registry.with(json_layer).try_init()
        }
        LogFormat::Text => {
            let text_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
            registry.with(text_layer).try_init()
        }
    };

    if let Err(err) = result {
        LOGGING_INITIALIZED.store(false, Ordering::SeqCst);
        return Err(LoggingError(err.to_string()));
    }

    tracing::debug!(level = %config.level, format = ?config.format, "logging initialised");
    Ok(())
}
