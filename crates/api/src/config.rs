//! Process configuration, read once at startup.
//!
//! This is the only place that looks at the environment. Everything below
//! the binary receives plain values.

use std::time::Duration;

use thiserror::Error;

use custodia_infra::{EngineConfig, StoreConfig};
use custodia_observability::LogFormat;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: `{value}` ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    /// Postgres when set, in-memory store otherwise.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub apply_timeout: Duration,
    pub lock_timeout: Duration,
    pub statement_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            database_url: None,
            db_max_connections: 10,
            apply_timeout: Duration::from_millis(5_000),
            lock_timeout: Duration::from_millis(3_000),
            statement_timeout: Duration::from_millis(5_000),
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any key/value source; unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            jwt_secret: lookup("JWT_SECRET")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.jwt_secret),
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS")?
                .unwrap_or(defaults.db_max_connections),
            apply_timeout: millis(&lookup, "APPLY_TIMEOUT_MS")?.unwrap_or(defaults.apply_timeout),
            lock_timeout: millis(&lookup, "LOCK_TIMEOUT_MS")?.unwrap_or(defaults.lock_timeout),
            statement_timeout: millis(&lookup, "STATEMENT_TIMEOUT_MS")?
                .unwrap_or(defaults.statement_timeout),
            log_format: match lookup("LOG_FORMAT") {
                Some(raw) => raw.parse().map_err(|e: custodia_observability::UnknownLogFormat| {
                    ConfigError::Invalid {
                        var: "LOG_FORMAT",
                        value: raw.clone(),
                        reason: e.to_string(),
                    }
                })?,
                None => defaults.log_format,
            },
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            apply_timeout: self.apply_timeout,
        }
    }

    pub fn store_config(&self) -> Option<StoreConfig> {
        self.database_url.as_ref().map(|url| StoreConfig {
            database_url: url.clone(),
            max_connections: self.db_max_connections,
            lock_timeout: self.lock_timeout,
            statement_timeout: self.statement_timeout,
        })
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        })
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse::<u64>(lookup, var)?.map(Duration::from_millis))
}
