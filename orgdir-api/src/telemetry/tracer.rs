//! Tracing subscriber initialization.

use std::str::FromStr;

use orgdir_core::ConfigError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{env_flag, env_or};
use crate::error::{ApiError, ApiResult};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    Json,
    /// Multi-line human readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}', expected json or pretty", other)),
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Default filter directive when `RUST_LOG` is unset
    pub log_level: String,
    pub log_format: LogFormat,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "orgdir-api".to_string(),
            log_level: "orgdir_api=debug,orgdir_query=info,tower_http=debug,info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Read `ORGDIR_SERVICE_NAME`, `ORGDIR_LOG_LEVEL`, `ORGDIR_LOG_FORMAT`
    /// and `ORGDIR_METRICS_ENABLED`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            service_name: env_or("ORGDIR_SERVICE_NAME", defaults.service_name)?,
            log_level: env_or("ORGDIR_LOG_LEVEL", defaults.log_level)?,
            log_format: env_or("ORGDIR_LOG_FORMAT", defaults.log_format)?,
            metrics_enabled: env_flag("ORGDIR_METRICS_ENABLED", defaults.metrics_enabled)?,
        })
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Must be called once, before
/// any other component logs.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        log_format = ?config.log_format,
        metrics_enabled = config.metrics_enabled,
        "Telemetry initialized"
    );
    Ok(())
}
