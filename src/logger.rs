//! Pluggable, verbosity-tiered logging sink.
//!
//! engine.io does not depend on a process-wide logging framework. Instead it
//! accepts any [`Logger`] implementation through [`crate::Config`], the same
//! way the reference implementation's `internal/logger` package accepted a
//! single injected `Logger` interface. [`LogCrateLogger`] is the default,
//! forwarding to the ubiquitous `log` facade so the crate still behaves like
//! a normal member of the Rust logging ecosystem out of the box.

use std::fmt::Arguments;
use std::sync::Arc;

/// A sink for engine.io's internal diagnostic messages.
///
/// Implementations should be cheap to call; the session and transport code
/// paths call into this on every ping, decode failure, and upgrade attempt.
///
pub trait Logger: Send + Sync {
    fn debug(&self, args: Arguments);
    fn info(&self, args: Arguments);
    fn warn(&self, args: Arguments);
    fn error(&self, args: Arguments);
}

/// A [`Logger`] that forwards to the `log` crate's global facade.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct LogCrateLogger;

impl Logger for LogCrateLogger {
    fn debug(&self, args: Arguments) {
        log::debug!("{}", args);
    }

    fn info(&self, args: Arguments) {
        log::info!("{}", args);
    }

    fn warn(&self, args: Arguments) {
        log::warn!("{}", args);
    }

    fn error(&self, args: Arguments) {
        log::error!("{}", args);
    }
}

pub(crate) type SharedLogger = Arc<dyn Logger>;

pub(crate) fn default() -> SharedLogger {
    Arc::new(LogCrateLogger)
}

macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(format_args!($($arg)*))
    };
}

macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(format_args!($($arg)*))
    };
}

macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(format_args!($($arg)*))
    };
}

macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(format_args!($($arg)*))
    };
}

pub(crate) use {log_debug, log_error, log_info, log_warn};
