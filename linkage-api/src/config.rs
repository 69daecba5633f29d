//! API Configuration Module
//!
//! Listener, CORS and timeout settings for the HTTP service. Configuration is
//! loaded from environment variables with defaults suited to development.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind the listener on.
    pub bind_host: String,

    /// Port to bind the listener on.
    pub port: u16,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Per-request timeout applied to every route.
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `LINKAGE_API_BIND`: Listener host (default: 0.0.0.0)
    /// - `PORT` or `LINKAGE_API_PORT`: Listener port (default: 8080)
    /// - `LINKAGE_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `LINKAGE_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `LINKAGE_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 30)
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let bind_host = std::env::var("LINKAGE_API_BIND").unwrap_or(defaults.bind_host);

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("LINKAGE_API_PORT").ok())
            .filter(|s| !s.trim().is_empty())
        {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", raw)))?,
            None => defaults.port,
        };

        let cors_origins = std::env::var("LINKAGE_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs = std::env::var("LINKAGE_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let request_timeout = std::env::var("LINKAGE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Ok(Self {
            bind_host,
            port,
            cors_origins,
            cors_max_age_secs,
            request_timeout,
        })
    }

    /// Resolve the listener address.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }

    /// Whether CORS is restricted to configured origins.
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.cors_origins.is_empty());
        assert!(!config.is_production());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_env_prefers_port() -> ApiResult<()> {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _port = EnvVarGuard::set("PORT", Some("9090"));
        let _api_port = EnvVarGuard::set("LINKAGE_API_PORT", Some("7070"));
        let _origins = EnvVarGuard::set(
            "LINKAGE_CORS_ORIGINS",
            Some("https://a.example, ,https://b.example"),
        );

        let config = ApiConfig::from_env()?;
        assert_eq!(config.port, 9090);
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(config.is_production());
        Ok(())
    }

    #[test]
    fn test_from_env_rejects_bad_port() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _port = EnvVarGuard::set("PORT", Some("not-a-port"));

        let err = ApiConfig::from_env().unwrap_err();
        assert!(err.message.contains("not-a-port"));
    }

    #[test]
    fn test_bind_addr() -> ApiResult<()> {
        let config = ApiConfig {
            bind_host: "127.0.0.1".to_string(),
            port: 3001,
            ..ApiConfig::default()
        };
        assert_eq!(config.bind_addr()?.port(), 3001);

        let bad = ApiConfig {
            bind_host: "not a host".to_string(),
            ..ApiConfig::default()
        };
        assert!(bad.bind_addr().is_err());
        Ok(())
    }
}
