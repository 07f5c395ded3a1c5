//! Subscriber setup for binaries and tests embedding the crate.
//!
//! Library code logs through the `log` macros and opens `tracing` spans.
//! [`init_logging`] installs one subscriber for both: `log` records are
//! forwarded through `tracing-log`.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use crate::error::ReceiptflowError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `default_filter`. Fails if a subscriber or logger is already installed.
pub fn init_logging(default_filter: &str, format: LogFormat) -> Result<(), ReceiptflowError> {
    let layer = match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(env_filter(default_filter))
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(env_filter(default_filter))
            .boxed(),
    };
    let subscriber = Registry::default().with(layer);

    tracing_log::LogTracer::init()
        .map_err(|e| ReceiptflowError::Logging(format!("Failed to bridge log records: {}", e)))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ReceiptflowError::Logging(format!("Failed to install subscriber: {}", e)))?;

    log::debug!("Logging initialized ({:?})", format);
    Ok(())
}
