//! Subscriber installation.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use super::{LogFormat, TracingConfig};

/// Keeps the subscriber alive for the life of the program.
#[must_use = "dropping the guard early is harmless but usually unintended"]
pub struct TracingGuard {
    format: LogFormat,
}

impl TracingGuard {
    /// The format the subscriber was installed with.
    pub fn format(&self) -> LogFormat {
        self.format
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(config: TracingConfig) -> Result<TracingGuard> {
    let filter = EnvFilter::try_new(config.log_filter())
        .with_context(|| format!("Invalid log filter '{}'", config.log_filter()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(config.include_location())
        .with_line_number(config.include_location())
        .with_target(config.include_target())
        .with_thread_names(config.include_thread_names())
        .with_thread_ids(config.include_thread_ids());

    match config.log_format() {
        LogFormat::Json => registry
            .with(layer.json().flatten_event(true))
            .try_init(),
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
    }
    .context("Failed to initialize tracing subscriber")?;

    Ok(TracingGuard {
        format: config.log_format(),
    })
}
