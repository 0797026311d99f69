use std::env;
use std::fmt::Display;
use std::str::FromStr;

use chrono::Duration;
use chrono_tz::Tz;
use croner::Cron;
use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_JWT_EXPIRES_IN: &str = "7d";
const DEFAULT_CLEANUP_SCHEDULE: &str = "0 0 * * *";
const DEFAULT_CLEANUP_TIMEZONE: &str = "Asia/Manila";
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub cleanup_schedule: String,
    pub cleanup_timezone: Tz,
    pub allowed_origins: Vec<String>,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .or_else(|_| env::var("MONGODB_URI"))
            .map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let jwt_expires_in = parse_duration(&var_or("JWT_EXPIRES_IN", DEFAULT_JWT_EXPIRES_IN))
            .map_err(|reason| ConfigError::Invalid {
                key: "JWT_EXPIRES_IN",
                reason,
            })?;

        let cleanup_schedule = var_or("CLEANUP_SCHEDULE", DEFAULT_CLEANUP_SCHEDULE);
        Cron::new(&cleanup_schedule)
            .parse()
            .map_err(|e| ConfigError::Invalid {
                key: "CLEANUP_SCHEDULE",
                reason: e.to_string(),
            })?;

        let cleanup_timezone = var_or("CLEANUP_TIMEZONE", DEFAULT_CLEANUP_TIMEZONE)
            .parse::<Tz>()
            .map_err(|e| ConfigError::Invalid {
                key: "CLEANUP_TIMEZONE",
                reason: e.to_string(),
            })?;

        Ok(Self {
            database_url,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            port: parse_var("PORT", DEFAULT_PORT)?,
            jwt_secret,
            jwt_expires_in,
            cleanup_schedule,
            cleanup_timezone,
            allowed_origins: split_origins(&var_or("CORS_ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS)),
            production: env::var("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
        })
    }

    /// Settings for running against an in-process store.
    pub fn local(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: String::new(),
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            port: DEFAULT_PORT,
            jwt_secret: jwt_secret.into(),
            jwt_expires_in: Duration::days(7),
            cleanup_schedule: DEFAULT_CLEANUP_SCHEDULE.to_string(),
            cleanup_timezone: chrono_tz::Asia::Manila,
            allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            production: false,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        tracing::debug!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses lifetimes written as `<n><unit>` with unit `s`, `m`, `h` or `d`.
/// A bare number is taken as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);

    let amount: i64 = digits
        .parse()
        .map_err(|_| format!("'{raw}' does not start with a number"))?;

    match unit {
        "" | "s" => Ok(Duration::seconds(amount)),
        "m" => Ok(Duration::minutes(amount)),
        "h" => Ok(Duration::hours(amount)),
        "d" => Ok(Duration::days(amount)),
        other => Err(format!("unknown unit '{other}'")),
    }
}
