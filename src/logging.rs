//! Structured logging setup.
//!
//! JSON output for production, compact human-readable output for
//! development, filtered by `RUST_LOG`-style directives. The audit trail
//! emits under the `vetclinic::audit` target, so a deployment can route
//! it separately with a filter directive.

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging (production).
    Json,
    /// Compact human-readable output (development).
    Pretty,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter applied when `RUST_LOG` is unset.
    pub default_directive: String,
    pub service_name: String,
    pub service_version: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            default_directive: "info".to_string(),
            service_name: "vetclinic-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Installs the global tracing subscriber. Fails if one is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_directive))
        .context("invalid log filter directive")?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(filter).with(fmt::layer().compact()).try_init()
        }
    }
    .map_err(|err| anyhow!("failed to install logging subscriber: {err}"))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "logging initialized"
    );
    Ok(())
}
