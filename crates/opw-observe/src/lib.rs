//! Logging bootstrap for worker processes embedding the memoization
//! core. Wraps `tracing-subscriber` behind a small config so demo
//! binaries and embedders initialize output the same way.

mod logger;
pub use logger::{LoggerConfig, LoggerError, LoggerFormat, logger_init};
