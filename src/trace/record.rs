//! Per-call trace record.
//!
//! # Responsibilities
//! - Snapshot the request line and headers at call start
//! - Aggregate phase timings reported by lifecycle hooks
//! - Hold the final outcome (status or error) and total duration
//!
//! # Design Decisions
//! - One record per call, shared via `Arc` between the orchestrator and the
//!   hooks; nothing is shared across calls
//! - Every mutable field sits behind a single mutex, held only for
//!   timestamp bookkeeping
//! - A poisoned lock is recovered: tracing must never fail the call

use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use http::{HeaderMap, Method, Request, StatusCode};
use uuid::Uuid;

use crate::security::MaskedHeaders;

/// A timed phase of the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    DnsLookup,
    Dialing,
    TlsHandshake,
    GetConnection,
    ServerProcessing,
}

impl Phase {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        self as usize
    }
}

/// Phase durations; `None` means the phase did not apply to the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub dns_lookup: Option<Duration>,
    pub dialing: Option<Duration>,
    pub tls_handshake: Option<Duration>,
    pub get_connection: Option<Duration>,
    pub server_processing: Option<Duration>,
    pub connection_reused: bool,
}

impl PhaseTimings {
    pub fn get(&self, phase: Phase) -> Option<Duration> {
        match phase {
            Phase::DnsLookup => self.dns_lookup,
            Phase::Dialing => self.dialing,
            Phase::TlsHandshake => self.tls_handshake,
            Phase::GetConnection => self.get_connection,
            Phase::ServerProcessing => self.server_processing,
        }
    }

    fn set(&mut self, phase: Phase, elapsed: Duration) {
        let slot = match phase {
            Phase::DnsLookup => &mut self.dns_lookup,
            Phase::Dialing => &mut self.dialing,
            Phase::TlsHandshake => &mut self.tls_handshake,
            Phase::GetConnection => &mut self.get_connection,
            Phase::ServerProcessing => &mut self.server_processing,
        };
        *slot = Some(elapsed);
    }

    /// The subset that is meaningful for reporting.
    ///
    /// A reused connection reports only the pool checkout; a fresh one
    /// reports DNS, dial and TLS and drops the checkout interval, which
    /// overlaps them.
    pub fn reported(&self) -> PhaseTimings {
        if self.connection_reused {
            PhaseTimings {
                dns_lookup: None,
                dialing: None,
                tls_handshake: None,
                get_connection: self.get_connection,
                server_processing: self.server_processing,
                connection_reused: true,
            }
        } else {
            PhaseTimings {
                get_connection: None,
                ..*self
            }
        }
    }
}

/// Final outcome of a call. Exactly one of status or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// Status line of the response, e.g. `201 Created`.
    Status(String),
    /// Description of the transport failure.
    Error(String),
}

impl CallOutcome {
    pub fn status(code: StatusCode) -> Self {
        CallOutcome::Status(status_line(code))
    }
}

/// `"<code> <reason>"`, or just the code when the reason is unknown.
pub fn status_line(code: StatusCode) -> String {
    match code.canonical_reason() {
        Some(reason) => format!("{} {}", code.as_u16(), reason),
        None => code.as_u16().to_string(),
    }
}

#[derive(Debug, Default)]
struct TraceState {
    outcome: Option<CallOutcome>,
    response_headers: Option<HeaderMap>,
    phases: PhaseTimings,
    starts: [Option<Instant>; Phase::COUNT],
    total: Option<Duration>,
}

/// Aggregated trace of one outbound call.
#[derive(Debug)]
pub struct TraceRecord {
    call_id: Uuid,
    method: Method,
    url: String,
    request_headers: HeaderMap,
    state: Mutex<TraceState>,
}

impl TraceRecord {
    pub fn new(method: Method, url: impl Into<String>, request_headers: HeaderMap) -> Self {
        Self {
            call_id: Uuid::new_v4(),
            method,
            url: url.into(),
            request_headers,
            state: Mutex::new(TraceState::default()),
        }
    }

    /// Snapshot the request line and headers of `request`.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::new(
            request.method().clone(),
            request.uri().to_string(),
            request.headers().clone(),
        )
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    fn lock(&self) -> MutexGuard<'_, TraceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark the start of `phase`. A later start replaces an earlier one.
    pub fn start_phase(&self, phase: Phase) {
        self.lock().starts[phase.index()] = Some(Instant::now());
    }

    /// Close `phase` and record its duration.
    ///
    /// Returns `None`, recording nothing, if the phase was never started.
    pub fn end_phase(&self, phase: Phase) -> Option<Duration> {
        let mut state = self.lock();
        let elapsed = state.starts[phase.index()].take()?.elapsed();
        state.phases.set(phase, elapsed);
        Some(elapsed)
    }

    /// Forget a started phase without recording it.
    pub fn abandon_phase(&self, phase: Phase) {
        self.lock().starts[phase.index()] = None;
    }

    /// Close the pool checkout and record whether the connection was reused.
    pub fn got_connection(&self, reused: bool) -> Option<Duration> {
        let mut state = self.lock();
        state.phases.connection_reused = reused;
        let elapsed = state.starts[Phase::GetConnection.index()].take()?.elapsed();
        state.phases.set(Phase::GetConnection, elapsed);
        Some(elapsed)
    }

    /// Finalize the record. Only the first call has an effect.
    pub fn complete(
        &self,
        outcome: CallOutcome,
        response_headers: Option<HeaderMap>,
        total: Duration,
    ) -> bool {
        let mut state = self.lock();
        if state.outcome.is_some() {
            return false;
        }
        if matches!(outcome, CallOutcome::Status(_)) {
            state.response_headers = response_headers;
        }
        state.outcome = Some(outcome);
        state.total = Some(total);
        true
    }

    pub fn is_complete(&self) -> bool {
        self.lock().outcome.is_some()
    }

    /// Phase timings as recorded, before the reporting rules are applied.
    pub fn raw_phases(&self) -> PhaseTimings {
        self.lock().phases
    }

    /// Consistent copy of the record with the reporting rules applied.
    pub fn snapshot(&self) -> TraceSnapshot {
        let state = self.lock();
        TraceSnapshot {
            call_id: self.call_id,
            method: self.method.clone(),
            url: self.url.clone(),
            outcome: state.outcome.clone(),
            response_headers: state.response_headers.clone(),
            phases: state.phases.reported(),
            total: state.total,
        }
    }

    /// Equivalent curl command (without body), credentials masked.
    pub fn to_curl(&self) -> String {
        let mut headers = String::new();
        for (name, value) in MaskedHeaders(&self.request_headers).pairs() {
            let _ = write!(headers, " -H {:?}", format!("{name}: {value}"));
        }
        format!("curl -v -X{}{} '{}'", self.method, headers, self.url)
    }
}

/// Finalized view of a [`TraceRecord`].
#[derive(Debug, Clone)]
pub struct TraceSnapshot {
    pub call_id: Uuid,
    pub method: Method,
    pub url: String,
    pub outcome: Option<CallOutcome>,
    pub response_headers: Option<HeaderMap>,
    pub phases: PhaseTimings,
    pub total: Option<Duration>,
}

impl TraceSnapshot {
    pub fn status(&self) -> Option<&str> {
        match &self.outcome {
            Some(CallOutcome::Status(status)) => Some(status),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Some(CallOutcome::Error(error)) => Some(error),
            _ => None,
        }
    }
}

/// Whole milliseconds, the unit every timing field is logged in.
pub fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
