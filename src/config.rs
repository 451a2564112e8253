use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub orders_api_url: String,
    pub routing_api_url: String,
    pub route_timeout_ms: u64,
    pub reload_retry_attempts: u32,
    pub reload_retry_backoff_ms: u64,
    pub feed_buffer_size: usize,
    pub tick_interval_ms: u64,
    pub session_resync_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            orders_api_url: env::var("ORDERS_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000/api".to_string()),
            routing_api_url: env::var("ROUTING_API_URL")
                .unwrap_or_else(|_| "https://router.project-osrm.org".to_string()),
            route_timeout_ms: parse_or_default("ROUTE_TIMEOUT_MS", 5_000)?,
            reload_retry_attempts: parse_or_default("RELOAD_RETRY_ATTEMPTS", 3)?,
            reload_retry_backoff_ms: parse_or_default("RELOAD_RETRY_BACKOFF_MS", 500)?,
            feed_buffer_size: parse_or_default("FEED_BUFFER_SIZE", 64)?,
            tick_interval_ms: parse_or_default("TICK_INTERVAL_MS", 1_000)?,
            session_resync_secs: parse_or_default("SESSION_RESYNC_SECS", 5)?,
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
