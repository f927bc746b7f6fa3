//! Server configuration from environment variables

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use blogctl_core::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

use crate::db::DEFAULT_MAX_CONNECTIONS;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3001";
const DEFAULT_WINDOW_MS: u64 = 60_000;
const DEFAULT_MAX_REQUESTS: u32 = 100;
const DEFAULT_ADMIN_MAX_REQUESTS: u32 = 50;

/// Configuration error
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{key} is required in production")]
    MissingInProduction { key: &'static str },

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Deployment environment (`APP_ENV`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
    Test,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for AppEnv {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            _ => Err(()),
        }
    }
}

/// Allowed CORS origins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigin {
    /// `*`: any origin
    Any,
    /// Comma-separated list
    List(Vec<String>),
}

impl CorsOrigin {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "*" {
            return Self::Any;
        }
        Self::List(
            raw.split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }
}

/// Fixed-window limits per client IP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
    pub admin_max_requests: u32,
    /// Key clients by `X-Forwarded-For` (only behind a proxy that sets it)
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(DEFAULT_WINDOW_MS),
            max_requests: DEFAULT_MAX_REQUESTS,
            admin_max_requests: DEFAULT_ADMIN_MAX_REQUESTS,
            trust_proxy: false,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:3000)
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub env: AppEnv,
    /// Admin routes reject every request when unset
    pub admin_api_key: Option<String>,
    pub cors_origin: CorsOrigin,
    pub rate_limit: RateLimitConfig,
    pub db_max_connections: u32,
    /// Attempts per store operation, first call included
    pub db_max_retries: u32,
}

impl ServerConfig {
    /// Defaults for everything except the database URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            database_url: database_url.into(),
            env: AppEnv::Development,
            admin_api_key: None,
            cors_origin: CorsOrigin::parse(DEFAULT_CORS_ORIGIN),
            rate_limit: RateLimitConfig::default(),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            db_max_retries: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Store retry policy with `DB_MAX_RETRIES` attempts.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(self.db_max_retries)
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let env = match get("APP_ENV") {
            Some(raw) => raw
                .parse()
                .map_err(|()| ConfigError::Invalid { key: "APP_ENV", value: raw })?,
            None => AppEnv::Development,
        };
        let admin_api_key = get("ADMIN_API_KEY");
        if env.is_production() && admin_api_key.is_none() {
            return Err(ConfigError::MissingInProduction {
                key: "ADMIN_API_KEY",
            });
        }

        let host: IpAddr = parse(get("HOST"), "HOST", DEFAULT_HOST.parse().ok())?;
        let port: u16 = parse(get("PORT"), "PORT", Some(DEFAULT_PORT))?;
        let window_ms: u64 = parse(
            get("RATE_LIMIT_WINDOW_MS"),
            "RATE_LIMIT_WINDOW_MS",
            Some(DEFAULT_WINDOW_MS),
        )?;

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            database_url,
            env,
            admin_api_key,
            cors_origin: CorsOrigin::parse(
                get("CORS_ORIGIN").as_deref().unwrap_or(DEFAULT_CORS_ORIGIN),
            ),
            rate_limit: RateLimitConfig {
                window: Duration::from_millis(window_ms),
                max_requests: parse(
                    get("RATE_LIMIT_MAX_REQUESTS"),
                    "RATE_LIMIT_MAX_REQUESTS",
                    Some(DEFAULT_MAX_REQUESTS),
                )?,
                admin_max_requests: parse(
                    get("RATE_LIMIT_ADMIN_MAX_REQUESTS"),
                    "RATE_LIMIT_ADMIN_MAX_REQUESTS",
                    Some(DEFAULT_ADMIN_MAX_REQUESTS),
                )?,
                trust_proxy: parse(get("TRUST_PROXY"), "TRUST_PROXY", Some(false))?,
            },
            db_max_connections: parse(
                get("DB_MAX_CONNECTIONS"),
                "DB_MAX_CONNECTIONS",
                Some(DEFAULT_MAX_CONNECTIONS),
            )?,
            db_max_retries: parse(
                get("DB_MAX_RETRIES"),
                "DB_MAX_RETRIES",
                Some(DEFAULT_MAX_ATTEMPTS),
            )?,
        })
    }
}

fn parse<T: FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => default.ok_or(ConfigError::Missing(key)),
    }
}
