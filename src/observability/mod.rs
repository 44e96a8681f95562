//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! transport/logging.rs, trace/hooks.rs
//!     → logging.rs (Logger handle scoped to the component)
//!     → level.rs (runtime-selected level for timing lines)
//!     → tracing subscriber (fmt, EnvFilter, or a test capture layer)
//! ```
//!
//! # Design Decisions
//! - Structured `tracing` events, one field per attribute
//! - Logger handles are passed explicitly, never looked up globally
//! - Header dumps are only rendered when their level is enabled

pub mod level;
pub mod logging;

pub use level::{ParseLevelError, TimingLevel};
pub use logging::Logger;
