/// Configuration management for gh-proxy-service
///
/// This module handles loading configuration from environment variables.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Response cache configuration
    pub cache: CacheConfig,
    /// Request pipeline limits
    pub proxy: ProxyConfig,
    /// Upstream (GitHub API) configuration
    pub upstream: UpstreamConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds; 0 means entries never expire
    pub max_cache_time_secs: i64,
    /// Soft cap on the cached_responses table footprint
    pub max_cache_size_mb: i64,
}

/// Request pipeline limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Incoming request body cap in bytes
    pub max_body_bytes: usize,
}

/// Upstream (GitHub API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream API
    pub base_url: String,
    /// Overall timeout for one upstream call, in seconds
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: std::env::var("GH_PROXY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("GH_PROXY_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/gh_proxy".to_string()),
                max_connections: std::env::var("DB_MAX_CONNS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(20),
            },
            cache: CacheConfig {
                max_cache_time_secs: std::env::var("MAX_CACHE_TIME")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
                max_cache_size_mb: std::env::var("MAX_CACHE_SIZE_MB")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(100),
            },
            proxy: ProxyConfig {
                max_body_bytes: std::env::var("MAX_PROXY_BODY_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1_048_576),
            },
            upstream: UpstreamConfig {
                base_url: std::env::var("GITHUB_API_BASE")
                    .map(|v| v.trim_end_matches('/').to_string())
                    .unwrap_or_else(|_| "https://api.github.com".to_string()),
                timeout_secs: std::env::var("UPSTREAM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for var in [
            "APP_ENV",
            "GH_PROXY_HOST",
            "GH_PROXY_PORT",
            "CORS_ALLOWED_ORIGINS",
            "DATABASE_URL",
            "DB_MAX_CONNS",
            "MAX_CACHE_TIME",
            "MAX_CACHE_SIZE_MB",
            "MAX_PROXY_BODY_BYTES",
            "GITHUB_API_BASE",
            "UPSTREAM_TIMEOUT_SECS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_defaults() {
        clear_env();

        let config = Config::from_env().unwrap();
        assert_eq!(config.app.port, 8080);
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.cache.max_cache_time_secs, 300);
        assert_eq!(config.cache.max_cache_size_mb, 100);
        assert_eq!(config.proxy.max_body_bytes, 1_048_576);
        assert_eq!(config.upstream.base_url, "https://api.github.com");
        assert_eq!(config.upstream.timeout_secs, 10);
    }

    #[test]
    #[serial_test::serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("MAX_CACHE_TIME", "0");
        std::env::set_var("MAX_PROXY_BODY_BYTES", "4096");
        std::env::set_var("GITHUB_API_BASE", "http://127.0.0.1:9999/");

        let config = Config::from_env().unwrap();
        assert_eq!(config.cache.max_cache_time_secs, 0);
        assert_eq!(config.proxy.max_body_bytes, 4096);
        // Trailing slash is trimmed so URL joining stays uniform
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:9999");

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_unparseable_values_fall_back_to_defaults() {
        clear_env();
        std::env::set_var("DB_MAX_CONNS", "not-a-number");
        std::env::set_var("MAX_CACHE_SIZE_MB", "");

        let config = Config::from_env().unwrap();
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.cache.max_cache_size_mb, 100);

        clear_env();
    }
}
