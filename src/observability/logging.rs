//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the process subscriber (fmt + `EnvFilter`)
//! - Provide a [`Logger`] handle that components receive explicitly
//!
//! # Design Decisions
//! - A `Logger` wraps a `tracing::Dispatch`; events are emitted with that
//!   dispatch scoped as the default, so each component can log to its own
//!   subscriber without touching global state
//! - Spans entered by outer middleware stay current while emitting, so their
//!   correlation fields are attached by the subscriber

use std::fmt;

use tracing::Dispatch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::observability::TimingLevel;

/// Handle to the subscriber a component logs into.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// Log into the given dispatch.
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Log into whatever dispatch is the default right now.
    pub fn current() -> Self {
        Self {
            dispatch: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Run `f` with this logger's dispatch as the default.
    pub fn emit<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Whether events at `level` would be recorded.
    pub fn enabled(&self, level: TimingLevel) -> bool {
        self.emit(|| level.enabled())
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

/// Install the process-wide fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set.
pub fn init(default_filter: &str) -> Result<Logger, tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(Logger::current())
}
