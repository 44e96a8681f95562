//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the transport.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observability::{Logger, TimingLevel};
use crate::transport::client::ClientOptions;
use crate::transport::LoggingOptions;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Logging and timing settings.
    pub observability: ObservabilityConfig,

    /// Network client settings.
    pub client: ClientConfig,
}

impl TransportConfig {
    /// Decorator options logging into `logger`.
    pub fn logging_options(&self, logger: Logger) -> LoggingOptions {
        LoggingOptions {
            logger,
            detailed_timing: self.observability.detailed_timing,
            detailed_timing_level: self.observability.detailed_timing_level,
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: Duration::from_millis(self.client.connect_timeout_ms),
            max_idle_per_host: self.client.max_idle_per_host,
            idle_timeout: Duration::from_secs(self.client.idle_timeout_secs),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive (e.g. "info" or "http_log_transport=debug").
    /// `RUST_LOG` overrides it.
    pub log_level: String,

    /// Install lifecycle hooks and log per-phase timings.
    pub detailed_timing: bool,

    /// Level of the timing lines.
    pub detailed_timing_level: TimingLevel,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            detailed_timing: false,
            detailed_timing_level: TimingLevel::Trace,
        }
    }
}

/// Network client configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Deadline for one TCP dial attempt in milliseconds.
    pub connect_timeout_ms: u64,

    /// Idle connections kept per host (0 disables reuse).
    pub max_idle_per_host: usize,

    /// Idle connections older than this are dropped, in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            max_idle_per_host: 32,
            idle_timeout_secs: 90,
        }
    }
}
