//! Runtime configuration for the relay server and the display consumer.
//!
//! Values resolve as: explicit CLI flag > `SIGNAGE_*` environment variable >
//! built-in default.

use crate::error::{RelayError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 7;

/// Read and parse an environment variable, `None` when unset or empty.
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map(Some).map_err(|_| {
            RelayError::InvalidInput(format!("{} has an invalid value: '{}'", key, raw))
        }),
        _ => Ok(None),
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Default database location: `~/.signage-relay/signage.db`, or
/// `./signage.db` when no home directory is available.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".signage-relay").join("signage.db"))
        .unwrap_or_else(|| PathBuf::from("signage.db"))
}

/// Resolve the database path from a flag or `SIGNAGE_DB_PATH`.
pub fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env_string("SIGNAGE_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

/// Log retention in days (`SIGNAGE_LOG_RETENTION_DAYS`).
pub fn log_retention_days() -> Result<u32> {
    Ok(env_parse("SIGNAGE_LOG_RETENTION_DAYS")?.unwrap_or(DEFAULT_LOG_RETENTION_DAYS))
}

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub broadcast_interval: Duration,
}

impl ServerConfig {
    pub fn resolve(
        host: Option<String>,
        port: Option<u16>,
        db_path: Option<PathBuf>,
        interval_ms: Option<u64>,
    ) -> Result<Self> {
        let host = host
            .or_else(|| env_string("SIGNAGE_HOST"))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match port {
            Some(p) => p,
            None => env_parse("SIGNAGE_PORT")?.unwrap_or(DEFAULT_PORT),
        };
        let interval_ms = match interval_ms {
            Some(ms) => ms,
            None => env_parse("SIGNAGE_BROADCAST_INTERVAL_MS")?
                .unwrap_or(DEFAULT_BROADCAST_INTERVAL.as_millis() as u64),
        };
        if interval_ms == 0 {
            return Err(RelayError::InvalidInput(
                "Broadcast interval must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            db_path: resolve_db_path(db_path),
            broadcast_interval: Duration::from_millis(interval_ms),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Display consumer configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    pub reconnect_delay: Duration,
    pub reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
        }
    }
}

impl ClientConfig {
    pub fn resolve(
        url: Option<String>,
        reconnect_delay_ms: Option<u64>,
        reconnect_attempts: Option<u32>,
    ) -> Result<Self> {
        let url = url
            .or_else(|| env_string("SIGNAGE_WS_URL"))
            .unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            return Err(RelayError::InvalidInput(format!(
                "WebSocket URL must start with ws:// or wss://: '{}'",
                url
            )));
        }
        let delay_ms = match reconnect_delay_ms {
            Some(ms) => ms,
            None => env_parse("SIGNAGE_RECONNECT_DELAY_MS")?
                .unwrap_or(DEFAULT_RECONNECT_DELAY.as_millis() as u64),
        };
        let attempts = match reconnect_attempts {
            Some(n) => n,
            None => env_parse("SIGNAGE_RECONNECT_ATTEMPTS")?.unwrap_or(DEFAULT_RECONNECT_ATTEMPTS),
        };

        Ok(Self {
            url,
            reconnect_delay: Duration::from_millis(delay_ms),
            reconnect_attempts: attempts,
        })
    }
}
