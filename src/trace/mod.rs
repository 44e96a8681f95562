//! Per-call lifecycle tracing.
//!
//! # Data Flow
//! ```text
//! LoggingTransport
//!     → record.rs (TraceRecord created from the request)
//!     → hooks.rs (RecordingTrace installed as TraceContext)
//!         ← inner transport fires DNS / dial / TLS / conn / first-byte hooks,
//!           possibly from other threads
//!     → record.rs (complete + snapshot with reporting rules applied)
//!     → summary and statistics log lines
//! ```
//!
//! # Design Decisions
//! - Hooks only ever touch the record through its mutex
//! - Unset phases mean "not applicable", never zero
//! - Phases are reported independently and never summed

pub mod hooks;
pub mod record;

pub use hooks::{ClientTrace, GotConnInfo, HookError, NoopTrace, RecordingTrace, TraceContext};
pub use record::{
    as_millis, status_line, CallOutcome, Phase, PhaseTimings, TraceRecord, TraceSnapshot,
};
