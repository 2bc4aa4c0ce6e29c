//! Logging configuration and initialization.
//!
//! Filter priority: `RUST_LOG`, then the `[logging]` table of config.lock,
//! then `info`. Output formats are pretty, compact and json.

use crate::config::LoggingLock;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Logging configuration from the lock file.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,
    /// Output format: pretty, compact, json
    pub format: String,
}

impl LogConfig {
    /// Creates a new LogConfig with default values.
    pub fn new() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl From<&LoggingLock> for LogConfig {
    fn from(lock: &LoggingLock) -> Self {
        Self {
            level: lock.level.clone(),
            format: lock.format.clone(),
        }
    }
}

/// Initializes the logging system.
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_logging(config: Option<&LogConfig>) {
    let env_filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), config);

    // Get format from config or default
    let format = config.map(|c| c.format.as_str()).unwrap_or("pretty");

    match format {
        "json" => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE),
            );
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        "compact" => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact());
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        _ => {
            // "pretty" or default
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer());
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    }
}

fn build_filter(rust_log: Option<&str>, config: Option<&LogConfig>) -> EnvFilter {
    match (rust_log, config) {
        (Some(directives), _) => EnvFilter::new(directives),
        (None, Some(cfg)) => EnvFilter::new(parse_level(&cfg.level).as_str()),
        (None, None) => EnvFilter::new("info"),
    }
}

/// Parses a log level string into a Level.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}
