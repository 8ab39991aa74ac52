//! Application configuration parsed from environment variables.

use chrono::Duration;
use thiserror::Error;

use reservo_auth::default_reset_ttl;
use reservo_events::EventBusConfig;
use reservo_observability::LogFormat;

pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;
pub const DEFAULT_BCRYPT_COST: u32 = 12;
pub const BCRYPT_COST_RANGE: core::ops::RangeInclusive<u32> = 4..=31;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_APPLICATION_URL: &str = "http://localhost:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ")]
    SharedSecret,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub password_reset_ttl: Duration,
    pub bcrypt_cost: u32,
    pub event_bus: EventBusConfig,
    pub application_url: String,
    /// Test mode exposes reset tokens in forgot-password responses.
    pub is_test: bool,
    pub port: u16,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Build typed config from the process environment.
    ///
    /// Required outside test mode:
    /// - `ACCESS_TOKEN_SECRET`, `REFRESH_TOKEN_SECRET` (must differ)
    ///
    /// Optional:
    /// - `ACCESS_TOKEN_TTL_SECS` (900), `REFRESH_TOKEN_TTL_SECS` (2592000),
    ///   `PASSWORD_RESET_TTL_SECS` (3600)
    ///   (each at most ten years)
    /// - `BCRYPT_COST` (12, within 4..=31)
    /// - `EVENT_BUS_WORKERS` (4), `EVENT_BUS_QUEUE_CAPACITY` (1024),
    ///   `EVENT_BUS_MAX_HANDLERS` (100)
    /// - `APPLICATION_URL`, `APP_ENV` (`test` enables test mode), `PORT` (8080)
    /// - `LOG_FORMAT`: `json` (default) or `pretty`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let is_test = lookup("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("test"));

        let access_token_secret = secret(&lookup, "ACCESS_TOKEN_SECRET", is_test, "test-access-secret")?;
        let refresh_token_secret = secret(&lookup, "REFRESH_TOKEN_SECRET", is_test, "test-refresh-secret")?;
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::SharedSecret);
        }

        let defaults = EventBusConfig::default();
        let event_bus = EventBusConfig {
            workers: parse_or(&lookup, "EVENT_BUS_WORKERS", defaults.workers)?,
            queue_capacity: parse_or(&lookup, "EVENT_BUS_QUEUE_CAPACITY", defaults.queue_capacity)?,
            max_handlers_per_event: parse_or(&lookup, "EVENT_BUS_MAX_HANDLERS", defaults.max_handlers_per_event)?,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(|e: reservo_observability::UnknownLogFormat| ConfigError::Invalid {
                var: "LOG_FORMAT",
                reason: e.to_string(),
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl: seconds(&lookup, "ACCESS_TOKEN_TTL_SECS", Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS))?,
            refresh_token_ttl: seconds(&lookup, "REFRESH_TOKEN_TTL_SECS", Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS))?,
            password_reset_ttl: seconds(&lookup, "PASSWORD_RESET_TTL_SECS", default_reset_ttl())?,
            bcrypt_cost: bcrypt_cost(&lookup)?,
            event_bus,
            application_url: lookup("APPLICATION_URL")
                .unwrap_or_else(|| DEFAULT_APPLICATION_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            is_test,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            log_format,
        })
    }

    /// Fixed secrets, cheap hashing, test mode.
    pub fn for_tests() -> Self {
        Self {
            access_token_secret: "test-access-secret".to_string(),
            refresh_token_secret: "test-refresh-secret".to_string(),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
            password_reset_ttl: default_reset_ttl(),
            bcrypt_cost: 4,
            event_bus: EventBusConfig::default(),
            application_url: DEFAULT_APPLICATION_URL.to_string(),
            is_test: true,
            port: 0,
            log_format: LogFormat::Pretty,
        }
    }
}

fn secret(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    is_test: bool,
    test_default: &str,
) -> Result<String, ConfigError> {
    match lookup(var).filter(|v| !v.is_empty()) {
        Some(value) => Ok(value),
        None if is_test => Ok(test_default.to_string()),
        None => Err(ConfigError::Missing(var)),
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    if lookup(var).is_none() {
        return Ok(default);
    }
    let secs: i64 = parse_or(lookup, var, 0)?;
    if !(1..=MAX_TOKEN_TTL_SECS).contains(&secs) {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("must be between 1 and {MAX_TOKEN_TTL_SECS} seconds"),
        });
    }
    Duration::try_seconds(secs).ok_or_else(|| ConfigError::Invalid {
        var,
        reason: "out of range".to_string(),
    })
}

fn bcrypt_cost(lookup: &impl Fn(&str) -> Option<String>) -> Result<u32, ConfigError> {
    let cost = parse_or(lookup, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
    if !BCRYPT_COST_RANGE.contains(&cost) {
        return Err(ConfigError::Invalid {
            var: "BCRYPT_COST",
            reason: format!("must be within {BCRYPT_COST_RANGE:?}"),
        });
    }
    Ok(cost)
}
