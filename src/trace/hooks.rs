//! Connection lifecycle hooks.
//!
//! Inner transports report lifecycle events through [`ClientTrace`]. The
//! hook set travels with the request as a [`TraceContext`] stored in its
//! extensions; transports that know nothing about tracing simply ignore it.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::Request;

use crate::event_at;
use crate::observability::{Logger, TimingLevel};
use crate::trace::record::{as_millis, Phase, TraceRecord};

/// Borrowed error handed to hooks.
pub type HookError<'a> = &'a (dyn StdError + Send + Sync + 'static);

/// Details of the connection handed to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GotConnInfo {
    /// The connection was taken from the idle pool.
    pub reused: bool,
    /// How long the connection sat idle before this checkout.
    pub idle_time: Option<Duration>,
}

/// Callbacks fired by an inner transport while it serves one request.
///
/// Hooks may run on any thread, and concurrently with each other. They sit
/// on the request's critical path, so implementations must not block.
pub trait ClientTrace: Send + Sync {
    fn dns_start(&self, _host: &str) {}
    fn dns_done(&self, _result: Result<&[SocketAddr], &io::Error>) {}
    fn connect_start(&self, _network: &str, _addr: SocketAddr) {}
    fn connect_done(&self, _network: &str, _addr: SocketAddr, _error: Option<&io::Error>) {}
    fn tls_handshake_start(&self) {}
    fn tls_handshake_done(&self, _error: Option<HookError<'_>>) {}
    fn get_conn(&self, _host_port: &str) {}
    fn got_conn(&self, _info: GotConnInfo) {}
    fn wrote_request(&self, _error: Option<HookError<'_>>) {}
    fn got_first_response_byte(&self) {}
}

/// Hook set installed into a request's extensions.
#[derive(Clone)]
pub struct TraceContext(Arc<dyn ClientTrace>);

impl TraceContext {
    pub fn new(trace: impl ClientTrace + 'static) -> Self {
        Self(Arc::new(trace))
    }

    pub fn from_arc(trace: Arc<dyn ClientTrace>) -> Self {
        Self(trace)
    }

    /// Attach to `request`, replacing any previously installed hooks.
    pub fn install<B>(self, request: &mut Request<B>) {
        request.extensions_mut().insert(self);
    }

    /// Hooks installed on `request`, if any.
    pub fn of<B>(request: &Request<B>) -> Option<Self> {
        request.extensions().get::<TraceContext>().cloned()
    }
}

impl Deref for TraceContext {
    type Target = dyn ClientTrace;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TraceContext").finish_non_exhaustive()
    }
}

/// Hooks that do nothing; used when a request carries no context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTrace;

impl ClientTrace for NoopTrace {}

/// Hook set that feeds one [`TraceRecord`].
pub struct RecordingTrace {
    record: Arc<TraceRecord>,
    logger: Logger,
    level: TimingLevel,
    dns_host: Mutex<Option<String>>,
}

impl RecordingTrace {
    pub fn new(record: Arc<TraceRecord>, logger: Logger, level: TimingLevel) -> Self {
        Self {
            record,
            logger,
            level,
            dns_host: Mutex::new(None),
        }
    }

    pub fn record(&self) -> &Arc<TraceRecord> {
        &self.record
    }

    fn take_dns_host(&self) -> String {
        self.dns_host
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .unwrap_or_default()
    }
}

impl ClientTrace for RecordingTrace {
    fn dns_start(&self, host: &str) {
        *self
            .dns_host
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(host.to_string());
        self.record.start_phase(Phase::DnsLookup);
    }

    fn dns_done(&self, result: Result<&[SocketAddr], &io::Error>) {
        let elapsed = self.record.end_phase(Phase::DnsLookup).map(as_millis);
        let host = self.take_dns_host();
        let call_id = self.record.call_id();
        self.logger.emit(|| match result {
            Ok(addrs) => event_at!(
                self.level,
                %call_id,
                dns_lookup = %host,
                resolved = ?addrs,
                dns_lookup_ms = elapsed,
                "HTTP trace: DNS lookup"
            ),
            Err(error) => event_at!(
                self.level,
                %call_id,
                dns_lookup = %host,
                %error,
                dns_lookup_ms = elapsed,
                "HTTP trace: DNS lookup failed"
            ),
        });
    }

    fn connect_start(&self, _network: &str, _addr: SocketAddr) {
        self.record.start_phase(Phase::Dialing);
    }

    fn connect_done(&self, network: &str, addr: SocketAddr, error: Option<&io::Error>) {
        let elapsed = self.record.end_phase(Phase::Dialing).map(as_millis);
        let call_id = self.record.call_id();
        self.logger.emit(|| match error {
            Some(error) => event_at!(
                self.level,
                %call_id,
                network,
                %addr,
                %error,
                dial_ms = elapsed,
                "HTTP trace: dial failed"
            ),
            None => event_at!(
                self.level,
                %call_id,
                network,
                %addr,
                dial_ms = elapsed,
                "HTTP trace: dial succeeded"
            ),
        });
    }

    fn tls_handshake_start(&self) {
        self.record.start_phase(Phase::TlsHandshake);
    }

    fn tls_handshake_done(&self, _error: Option<HookError<'_>>) {
        // Failed handshakes still took time; record either way.
        self.record.end_phase(Phase::TlsHandshake);
    }

    fn get_conn(&self, _host_port: &str) {
        self.record.start_phase(Phase::GetConnection);
    }

    fn got_conn(&self, info: GotConnInfo) {
        self.record.got_connection(info.reused);
    }

    fn wrote_request(&self, error: Option<HookError<'_>>) {
        match error {
            None => self.record.start_phase(Phase::ServerProcessing),
            Some(_) => self.record.abandon_phase(Phase::ServerProcessing),
        }
    }

    fn got_first_response_byte(&self) {
        self.record.end_phase(Phase::ServerProcessing);
    }
}

impl fmt::Debug for RecordingTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingTrace")
            .field("call_id", &self.record.call_id())
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}
