//! Shared utilities
//!
//! Logging setup and timing helpers.

pub mod logger;
pub mod timer;

pub use logger::{init_logger, LogLevel};
pub use timer::{Stopwatch, Timer};
