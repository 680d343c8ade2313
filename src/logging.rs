//! Signage Relay Logging System
//!
//! Provides structured logging with configurable levels and output formats.
//! Uses tracing crate for structured logging with spans and events.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to output
    pub level: Level,
    /// Enable colored output
    pub color: bool,
    /// Show timestamps
    pub show_timestamps: bool,
    /// Show target/module name
    pub show_target: bool,
    /// Enable JSON format for machine parsing
    pub json_format: bool,
    /// Enable span events for tracing
    pub enable_spans: bool,
    /// Output to a daily-rotated file instead of stdout
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            color: true,
            show_timestamps: false,
            show_target: false,
            json_format: false,
            enable_spans: false,
            file_output: None,
        }
    }
}

impl LoggingConfig {
    /// Create config for different application modes
    pub fn for_mode(mode: ApplicationMode) -> Self {
        match mode {
            ApplicationMode::Server => Self {
                level: Level::INFO,
                color: false, // Long-running service
                show_timestamps: true,
                show_target: true,
                json_format: false,
                enable_spans: true,
                file_output: None,
            },
            ApplicationMode::Client => Self {
                level: Level::INFO,
                color: false,
                show_timestamps: true,
                show_target: false,
                json_format: false,
                enable_spans: false,
                file_output: None,
            },
            ApplicationMode::Cli => Self::default(),
            ApplicationMode::Test => Self {
                level: Level::DEBUG,
                color: false,
                show_timestamps: true,
                show_target: true,
                json_format: false,
                enable_spans: true,
                file_output: None,
            },
        }
    }

    /// Create config from CLI arguments
    pub fn from_args(quiet: bool, verbose: bool, json: bool) -> Self {
        let level = if verbose {
            Level::DEBUG
        } else if quiet {
            Level::ERROR
        } else {
            Level::INFO
        };

        Self {
            level,
            color: !quiet && !json && io::stdout().is_terminal(),
            show_timestamps: verbose || json,
            show_target: verbose,
            json_format: json,
            enable_spans: verbose,
            file_output: None,
        }
    }
}

/// Application modes with different logging requirements
#[derive(Debug, Clone, Copy)]
pub enum ApplicationMode {
    /// Relay server - detailed, usually redirected to a file
    Server,
    /// Display consumer (`watch`)
    Client,
    /// One-shot CLI commands
    Cli,
    /// Test mode - maximum detail for testing
    Test,
}

/// Initialize the logging system
pub fn init_logging(config: LoggingConfig) -> io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("signage_relay={}", config.level)));

    let registry = Registry::default().with(env_filter);

    if let Some(log_file) = config.file_output {
        let dir = log_file.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Invalid log file path")
        })?;
        let name = log_file.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Invalid log file name")
        })?;
        let file_appender = tracing_appender::rolling::daily(dir, name);

        if config.json_format {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(config.enable_spans)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(file_appender);
            json_layer.with_subscriber(registry).init();
        } else {
            fmt::layer()
                .with_target(config.show_target)
                .with_level(true)
                .with_ansi(false)
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_writer(file_appender)
                .with_subscriber(registry)
                .init();
        }
    } else if config.json_format {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(config.enable_spans)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(io::stdout);
        json_layer.with_subscriber(registry).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_level(true)
            .with_ansi(config.color)
            .with_writer(io::stdout);

        if config.show_timestamps {
            fmt_layer
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_subscriber(registry)
                .init();
        } else {
            fmt_layer.with_subscriber(registry).init();
        }
    }

    Ok(())
}

/// Directory holding the relay's log files (`~/.signage-relay/logs`).
pub fn log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".signage-relay").join("logs"))
}

/// Get log file path for a given application mode, creating the directory.
pub fn log_file_path(mode: ApplicationMode) -> io::Result<PathBuf> {
    let log_dir = log_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "No home directory"))?;
    std::fs::create_dir_all(&log_dir)?;

    Ok(match mode {
        ApplicationMode::Server => log_dir.join("server.log"),
        ApplicationMode::Client => log_dir.join("watch.log"),
        ApplicationMode::Cli => log_dir.join("cli.log"),
        ApplicationMode::Test => log_dir.join("test.log"),
    })
}

/// Clean up old log files based on retention policy
///
/// Only removes rotated files, i.e. names containing `.log.` followed by
/// a date suffix (`server.log.2026-10-01`).
pub fn cleanup_old_logs(log_dir: &Path, retention_days: u32) -> io::Result<usize> {
    use std::fs;
    use std::time::{Duration, SystemTime};

    if !log_dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let retention = Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
    let mut cleaned = 0;

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.to_string_lossy().contains(".log.") || !path.is_file() {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        let Ok(age) = now.duration_since(modified) else {
            continue;
        };
        if age <= retention {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                cleaned += 1;
                tracing::info!(
                    "Cleaned up old log file: {} (age: {} days)",
                    path.display(),
                    age.as_secs() / 86400
                );
            },
            Err(e) => {
                tracing::warn!("Failed to remove old log file {}: {}", path.display(), e);
            },
        }
    }

    Ok(cleaned)
}

/// Log macro for scheduler / fan-out lifecycle events
#[macro_export]
macro_rules! log_broadcast_operation {
    ($operation:expr, $clients:expr) => {
        tracing::info!(
            operation = $operation,
            clients = $clients,
            "Broadcast operation"
        );
    };
}

/// Log macro for consumer connection lifecycle events
#[macro_export]
macro_rules! log_client_operation {
    ($operation:expr, $url:expr) => {
        tracing::info!(operation = $operation, url = %$url, "Client operation");
    };
    ($operation:expr, $url:expr, $details:expr) => {
        tracing::info!(
            operation = $operation,
            url = %$url,
            details = %$details,
            "Client operation"
        );
    };
}

/// Utility macro for structured error logging
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Operation failed"
        );
    };
}
