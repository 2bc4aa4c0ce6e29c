//! Telemetry module for logging and metrics.
//!
//! Provides:
//! - Logging configuration and initialization
//! - Daemon-side metrics (socket traffic, neighbor resolution, table sizes)

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig};
pub use metrics::{Counter, InterfaceStats, MetricsRegistry};
