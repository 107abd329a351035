use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::db::DEFAULT_BATCH_SIZE;
use crate::error::AppError;
use crate::lifecycle::Calendar;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// `None` disables the background reconcile loop.
    pub reconcile_interval: Option<Duration>,
    pub calendar: Calendar,
    pub batch_size: usize,
    pub time_travel_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://owldone.db?mode=rwc".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            reconcile_interval: Some(Duration::from_secs(300)),
            calendar: Calendar::utc(),
            batch_size: DEFAULT_BATCH_SIZE,
            time_travel_enabled: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);
        let bind_addr = parse_or(&lookup, "BIND_ADDR", defaults.bind_addr)?;

        let interval_secs: u64 = parse_or(&lookup, "RECONCILE_INTERVAL_SECS", 300)?;
        let reconcile_interval = (interval_secs > 0).then(|| Duration::from_secs(interval_secs));

        let offset_minutes: i32 = parse_or(&lookup, "LIFECYCLE_UTC_OFFSET_MINUTES", 0)?;
        let calendar = Calendar::from_offset_minutes(offset_minutes).ok_or_else(|| {
            AppError::Config(format!(
                "LIFECYCLE_UTC_OFFSET_MINUTES out of range: {}",
                offset_minutes
            ))
        })?;

        let batch_size: usize = parse_or(&lookup, "RECONCILE_BATCH_SIZE", defaults.batch_size)?;
        if batch_size == 0 {
            return Err(AppError::Config(
                "RECONCILE_BATCH_SIZE must be greater than 0".to_string(),
            ));
        }

        let time_travel_enabled = parse_or(&lookup, "TIME_TRAVEL_ENABLED", false)?;

        Ok(Self {
            database_url,
            bind_addr,
            reconcile_interval,
            calendar,
            batch_size,
            time_travel_enabled,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{} is invalid: {}", key, e))),
        _ => Ok(default),
    }
}
