//! Logging setup for the daemon.
//!
//! Engine code emits `tracing` events and spans; the storage layer uses the
//! `log` facade, which is forwarded into the same subscriber. `RUST_LOG`
//! overrides the configured filter.

use std::io;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to bridge log records: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("A global subscriber is already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Installs the global subscriber.
///
/// * `default_filter` - filter directives used when `RUST_LOG` is unset
/// * `json` - emit one JSON object per line instead of human-readable text
pub fn init_logging(default_filter: &str, json: bool) -> Result<(), LoggingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_log::LogTracer::init()?;

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(io::stderr);
        tracing::subscriber::set_global_default(registry.with(layer))?;
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(io::stderr);
        tracing::subscriber::set_global_default(registry.with(layer))?;
    }

    Ok(())
}
