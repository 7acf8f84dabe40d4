//! API Configuration Module
//!
//! HTTP, CORS and cache settings loaded from environment variables with
//! defaults suitable for development. Values that are present but cannot be
//! parsed are rejected instead of silently replaced by a default.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use orgdir_core::ConfigError;
use orgdir_query::{PlannerConfig, DEFAULT_MAX_RADIUS_KM};
use orgdir_storage::{
    CacheBackend, CacheConfig, InMemoryCacheBackend, LmdbCacheBackend, DEFAULT_SWEEP_INTERVAL,
};

// ============================================================================
// ENV HELPERS
// ============================================================================

/// Read and parse an environment variable, falling back to `default` when it
/// is unset or blank.
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    field: key.to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })
        }
        _ => Ok(default),
    }
}

/// Parse a boolean flag: `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`.
pub(crate) fn env_flag(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                field: key.to_string(),
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
        _ => Ok(default),
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Interface to bind.
    pub bind: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,
    /// Deployment environment name, reported by `/health`.
    pub environment: String,
    pub debug: bool,
    /// Largest radius accepted by radius queries.
    pub max_radius_km: f64,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
            environment: "development".to_string(),
            debug: false,
            max_radius_km: DEFAULT_MAX_RADIUS_KM,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// - `ORGDIR_API_BIND`: interface (default: 0.0.0.0)
    /// - `PORT` or `ORGDIR_API_PORT`: port (default: 8000)
    /// - `ORGDIR_CORS_ORIGINS`: comma-separated origins (empty = allow all)
    /// - `ORGDIR_ENVIRONMENT`: environment name (default: development)
    /// - `ORGDIR_DEBUG`: debug flag (default: false)
    /// - `ORGDIR_MAX_RADIUS_KM`: radius ceiling (default: 100)
    /// - `ORGDIR_REQUEST_TIMEOUT_SECS`: per-request timeout (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port_key = if std::env::var("PORT").is_ok() {
            "PORT"
        } else {
            "ORGDIR_API_PORT"
        };

        let cors_origins = std::env::var("ORGDIR_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let max_radius_km: f64 = env_or("ORGDIR_MAX_RADIUS_KM", defaults.max_radius_km)?;
        if !max_radius_km.is_finite() || max_radius_km <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "ORGDIR_MAX_RADIUS_KM".to_string(),
                value: max_radius_km.to_string(),
                reason: "must be a positive number".to_string(),
            });
        }

        Ok(Self {
            bind: env_or("ORGDIR_API_BIND", defaults.bind)?,
            port: env_or(port_key, defaults.port)?,
            cors_origins,
            environment: env_or("ORGDIR_ENVIRONMENT", defaults.environment)?,
            debug: env_flag("ORGDIR_DEBUG", defaults.debug)?,
            max_radius_km,
            request_timeout: Duration::from_secs(env_or(
                "ORGDIR_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
        })
    }

    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|allowed| allowed == origin)
    }

    /// Planner limits derived from this configuration.
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig::default().with_max_radius_km(self.max_radius_km)
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Which cache backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Lmdb,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(CacheBackendKind::Memory),
            "lmdb" => Ok(CacheBackendKind::Lmdb),
            other => Err(format!("unknown cache backend '{}', expected memory or lmdb", other)),
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    pub backend: CacheBackendKind,
    /// LMDB environment directory; required for the LMDB backend.
    pub path: Option<PathBuf>,
    /// LMDB map size in megabytes.
    pub max_size_mb: usize,
    /// Pause between expired-entry sweeps. Zero disables sweeping.
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600),
            backend: CacheBackendKind::Memory,
            path: None,
            max_size_mb: 64,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl CacheSettings {
    /// Create CacheSettings from environment variables.
    ///
    /// - `ORGDIR_CACHE_ENABLED` (default: true)
    /// - `ORGDIR_CACHE_TTL_SECS` (default: 3600)
    /// - `ORGDIR_CACHE_BACKEND`: `memory` or `lmdb` (default: memory)
    /// - `ORGDIR_CACHE_PATH`: LMDB directory
    /// - `ORGDIR_CACHE_MAX_MB` (default: 64)
    /// - `ORGDIR_CACHE_SWEEP_SECS`: expired-entry sweep interval, 0 disables (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            enabled: env_flag("ORGDIR_CACHE_ENABLED", defaults.enabled)?,
            ttl: Duration::from_secs(env_or("ORGDIR_CACHE_TTL_SECS", defaults.ttl.as_secs())?),
            backend: env_or("ORGDIR_CACHE_BACKEND", defaults.backend)?,
            path: std::env::var("ORGDIR_CACHE_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            max_size_mb: env_or("ORGDIR_CACHE_MAX_MB", defaults.max_size_mb)?,
            sweep_interval: Duration::from_secs(env_or(
                "ORGDIR_CACHE_SWEEP_SECS",
                defaults.sweep_interval.as_secs(),
            )?),
        })
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_enabled(self.enabled)
            .with_ttl(self.ttl)
    }

    /// Interval for the background sweeper, if one should run.
    pub fn sweep_every(&self) -> Option<Duration> {
        (self.enabled && !self.sweep_interval.is_zero()).then_some(self.sweep_interval)
    }

    /// Open the configured backend.
    pub fn open_backend(&self) -> Result<Arc<dyn CacheBackend>, ConfigError> {
        match self.backend {
            CacheBackendKind::Memory => Ok(Arc::new(InMemoryCacheBackend::new())),
            CacheBackendKind::Lmdb => {
                let path = self.path.as_ref().ok_or_else(|| ConfigError::MissingRequired {
                    field: "ORGDIR_CACHE_PATH".to_string(),
                })?;
                let backend = LmdbCacheBackend::new(path, self.max_size_mb).map_err(|e| {
                    ConfigError::InvalidValue {
                        field: "ORGDIR_CACHE_PATH".to_string(),
                        value: path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Arc::new(backend))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.max_radius_km, 100.0);
        assert_eq!(config.planner_config().max_radius_km, 100.0);
    }

    #[test]
    fn test_origin_allowed() {
        let mut config = ApiConfig::default();
        assert!(config.is_origin_allowed("http://localhost:3000"));

        config.cors_origins = vec!["https://prod.example".to_string()];
        assert!(config.is_origin_allowed("https://prod.example"));
        assert!(!config.is_origin_allowed("https://evil.example"));
    }

    #[test]
    fn test_cache_backend_kind_parse() {
        assert_eq!("LMDB".parse::<CacheBackendKind>(), Ok(CacheBackendKind::Lmdb));
        assert_eq!("memory".parse::<CacheBackendKind>(), Ok(CacheBackendKind::Memory));
        assert!("redis".parse::<CacheBackendKind>().is_err());
    }

    #[test]
    fn test_cache_settings_defaults() {
        let settings = CacheSettings::default();
        let config = settings.cache_config();
        assert!(config.enabled);
        assert_eq!(config.default_ttl, Duration::from_secs(3600));
        assert!(settings.open_backend().is_ok());
    }

    #[test]
    fn test_sweep_interval() {
        let settings = CacheSettings::default();
        assert_eq!(settings.sweep_every(), Some(Duration::from_secs(60)));

        let off = CacheSettings {
            sweep_interval: Duration::ZERO,
            ..CacheSettings::default()
        };
        assert_eq!(off.sweep_every(), None);

        let disabled = CacheSettings {
            enabled: false,
            ..CacheSettings::default()
        };
        assert_eq!(disabled.sweep_every(), None);
    }

    #[test]
    fn test_lmdb_requires_path() {
        let settings = CacheSettings {
            backend: CacheBackendKind::Lmdb,
            ..CacheSettings::default()
        };
        assert!(matches!(
            settings.open_backend(),
            Err(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_env_or_rejects_garbage() {
        std::env::set_var("ORGDIR_TEST_CONFIG_GARBAGE", "not-a-number");
        let result: Result<u16, _> = env_or("ORGDIR_TEST_CONFIG_GARBAGE", 1);
        std::env::remove_var("ORGDIR_TEST_CONFIG_GARBAGE");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let fallback: u16 = env_or("ORGDIR_TEST_CONFIG_UNSET", 7).unwrap();
        assert_eq!(fallback, 7);
    }
}
