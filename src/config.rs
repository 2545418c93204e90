use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub sms_gateway_url: Option<String>,
    pub sms_timeout: Duration,
    pub evidence_dir: String,
    pub overdue_interval: Duration,
    pub cleanup_interval: Duration,
    pub tier_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            sms_gateway_url: env::var("SMS_GATEWAY_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            sms_timeout: Duration::from_secs(parse_or_default("SMS_TIMEOUT_SECS", 10)?),
            evidence_dir: env::var("EVIDENCE_DIR").unwrap_or_else(|_| "uploads".to_string()),
            overdue_interval: secs_or_default("OVERDUE_INTERVAL_SECS", 4 * 60 * 60)?,
            cleanup_interval: secs_or_default("CLEANUP_INTERVAL_SECS", 60 * 60)?,
            tier_interval: secs_or_default("TIER_INTERVAL_SECS", 24 * 60 * 60)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

/// Job periods must be non-zero; `tokio::time::interval` panics otherwise.
fn secs_or_default(key: &str, default: u64) -> Result<Duration, AppError> {
    match parse_or_default(key, default)? {
        0 => Err(AppError::Internal(format!("{key} must be greater than zero"))),
        secs => Ok(Duration::from_secs(secs)),
    }
}
