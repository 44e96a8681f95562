//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0)
//! - Check the log filter directive parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TransportConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use tracing_subscriber::EnvFilter;

use crate::config::schema::TransportConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `client.connect_timeout_ms` is zero.
    ZeroConnectTimeout,
    /// Reuse is enabled but idle connections expire immediately.
    ZeroIdleTimeout,
    /// `observability.log_level` is not a valid filter directive.
    InvalidLogFilter { directive: String, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ZeroConnectTimeout => {
                write!(f, "client.connect_timeout_ms must be greater than 0")
            }
            ValidationError::ZeroIdleTimeout => write!(
                f,
                "client.idle_timeout_secs must be greater than 0 when max_idle_per_host > 0"
            ),
            ValidationError::InvalidLogFilter { directive, reason } => {
                write!(f, "observability.log_level '{}' is invalid: {}", directive, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check `config` for semantic errors.
pub fn validate_config(config: &TransportConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.client.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }
    if config.client.max_idle_per_host > 0 && config.client.idle_timeout_secs == 0 {
        errors.push(ValidationError::ZeroIdleTimeout);
    }
    if let Err(e) = EnvFilter::try_new(&config.observability.log_level) {
        errors.push(ValidationError::InvalidLogFilter {
            directive: config.observability.log_level.clone(),
            reason: e.to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
