//! Runtime-selectable log levels.
//!
//! `tracing` macros take their level as a constant, so events whose level
//! comes from configuration go through [`event_at!`](crate::event_at).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Level at which detailed timing lines are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingLevel {
    #[default]
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl TimingLevel {
    /// Whether the current dispatcher would record an event at this level.
    pub fn enabled(self) -> bool {
        match self {
            TimingLevel::Trace => tracing::enabled!(tracing::Level::TRACE),
            TimingLevel::Debug => tracing::enabled!(tracing::Level::DEBUG),
            TimingLevel::Info => tracing::enabled!(tracing::Level::INFO),
            TimingLevel::Warn => tracing::enabled!(tracing::Level::WARN),
            TimingLevel::Error => tracing::enabled!(tracing::Level::ERROR),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimingLevel::Trace => "trace",
            TimingLevel::Debug => "debug",
            TimingLevel::Info => "info",
            TimingLevel::Warn => "warn",
            TimingLevel::Error => "error",
        }
    }
}

impl From<TimingLevel> for tracing::Level {
    fn from(level: TimingLevel) -> Self {
        match level {
            TimingLevel::Trace => tracing::Level::TRACE,
            TimingLevel::Debug => tracing::Level::DEBUG,
            TimingLevel::Info => tracing::Level::INFO,
            TimingLevel::Warn => tracing::Level::WARN,
            TimingLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for TimingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}' (expected trace, debug, info, warn or error)")]
pub struct ParseLevelError(pub String);

impl FromStr for TimingLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(TimingLevel::Trace),
            "debug" => Ok(TimingLevel::Debug),
            "info" => Ok(TimingLevel::Info),
            "warn" | "warning" => Ok(TimingLevel::Warn),
            "error" => Ok(TimingLevel::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Emit a `tracing` event at a [`TimingLevel`] chosen at runtime.
///
/// Accepts the same field/message syntax as `tracing::event!`.
#[macro_export]
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            $crate::observability::TimingLevel::Trace => ::tracing::trace!($($arg)+),
            $crate::observability::TimingLevel::Debug => ::tracing::debug!($($arg)+),
            $crate::observability::TimingLevel::Info => ::tracing::info!($($arg)+),
            $crate::observability::TimingLevel::Warn => ::tracing::warn!($($arg)+),
            $crate::observability::TimingLevel::Error => ::tracing::error!($($arg)+),
        }
    };
}
