//! # kmon Utilities
//!
//! Shared utilities and logging for the kmon workspace.
//!
//! Logging is built on `tracing`; the library crates only emit events, and
//! the binary installs a subscriber through this crate.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_logging, init_monitor_logging, monitor_log_path, LogConfig, LogFormat, LogGuard, LogLevel, LoggingError,
};
pub use tracing::{debug, error, info, trace, warn};
