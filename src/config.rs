use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::AppError;

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// School-local offset used for "today" and "now".
    pub school_offset: FixedOffset,
    pub summary_cache_ttl: Duration,
    /// Slot length assumed for a recurring schedule when checking overlaps.
    pub assumed_class_duration_minutes: i64,
    /// Session length used by generation when the program has none.
    pub default_session_duration_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://dojo.db?mode=rwc".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            school_offset: Utc.fix(),
            summary_cache_ttl: Duration::from_secs(300),
            assumed_class_duration_minutes: 60,
            default_session_duration_minutes: 60,
        }
    }
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let bind_addr = parse_var("BIND_ADDR")?.unwrap_or(defaults.bind_addr);

        let offset_minutes: i32 = parse_var("SCHOOL_UTC_OFFSET_MINUTES")?.unwrap_or(0);
        let school_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            AppError::Config(format!(
                "SCHOOL_UTC_OFFSET_MINUTES out of range: {}",
                offset_minutes
            ))
        })?;

        let summary_cache_ttl = parse_var::<u64>("SUMMARY_CACHE_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.summary_cache_ttl);

        let assumed_class_duration_minutes = positive(
            "ASSUMED_CLASS_DURATION_MINUTES",
            parse_var("ASSUMED_CLASS_DURATION_MINUTES")?
                .unwrap_or(defaults.assumed_class_duration_minutes),
        )?;
        let default_session_duration_minutes = positive(
            "DEFAULT_SESSION_DURATION_MINUTES",
            parse_var("DEFAULT_SESSION_DURATION_MINUTES")?
                .unwrap_or(defaults.default_session_duration_minutes),
        )?;

        Ok(Self {
            database_url,
            bind_addr,
            school_offset,
            summary_cache_ttl,
            assumed_class_duration_minutes,
            default_session_duration_minutes,
        })
    }
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

fn positive(key: &str, value: i64) -> Result<i64, AppError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(AppError::Config(format!("{} must be positive", key)))
    }
}
