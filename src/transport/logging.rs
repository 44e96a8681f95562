//! Logging transport decorator.
//!
//! # Responsibilities
//! - Log every outbound request and its outcome as structured events
//! - Optionally install lifecycle hooks and report per-phase timings
//! - Mask credentials in every logged header
//!
//! # Design Decisions
//! - Observes only: the inner result is returned untouched
//! - Exactly one `response` summary per call, including failed and
//!   cancelled calls (a drop guard covers cancellation)
//! - Without detailed timing nothing is attached to the request
//! - Header dumps are skipped unless their level is enabled

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use futures_util::future::BoxFuture;
use http::{HeaderMap, Request, Response};
use tower::{Layer, Service};

use crate::event_at;
use crate::observability::{Logger, TimingLevel};
use crate::security::MaskedHeaders;
use crate::trace::{as_millis, CallOutcome, RecordingTrace, TraceContext, TraceRecord};
use crate::transport::{DeliverResult, HttpTransport, Transport, TransportError};

/// Options recognized by [`LoggingTransport`].
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Where log events go.
    pub logger: Logger,
    /// Install lifecycle hooks and log phase timings.
    pub detailed_timing: bool,
    /// Level of the timing lines when `detailed_timing` is on.
    pub detailed_timing_level: TimingLevel,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            logger: Logger::current(),
            detailed_timing: false,
            detailed_timing_level: TimingLevel::Trace,
        }
    }
}

/// Transport decorator that logs requests, responses and phase timings.
pub struct LoggingTransport<T = HttpTransport> {
    inner: Arc<T>,
    options: LoggingOptions,
}

impl<T> Clone for LoggingTransport<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            options: self.options.clone(),
        }
    }
}

impl<T: Transport> LoggingTransport<T> {
    pub fn new(inner: T, options: LoggingOptions) -> Self {
        Self {
            inner: Arc::new(inner),
            options,
        }
    }

    pub fn builder(inner: T) -> LoggingTransportBuilder<T> {
        LoggingTransportBuilder {
            inner,
            options: LoggingOptions::default(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn options(&self) -> &LoggingOptions {
        &self.options
    }

    async fn round_trip(&self, mut request: Request<Body>) -> DeliverResult {
        let record = Arc::new(TraceRecord::from_request(&request));
        self.log_request(&record);

        if self.options.detailed_timing {
            TraceContext::new(RecordingTrace::new(
                Arc::clone(&record),
                self.options.logger.clone(),
                self.options.detailed_timing_level,
            ))
            .install(&mut request);
        }

        let mut call = PendingCall {
            record,
            options: &self.options,
            started: Instant::now(),
            finished: false,
        };
        let result = self.inner.deliver(request).await;
        call.finish(&result);

        result
    }

    fn log_request(&self, record: &TraceRecord) {
        let call_id = record.call_id();
        self.options.logger.emit(|| {
            tracing::debug!(
                %call_id,
                method = %record.method(),
                url = %record.url(),
                "request info"
            );
            if tracing::enabled!(tracing::Level::DEBUG) {
                tracing::debug!(
                    %call_id,
                    headers = %MaskedHeaders(record.request_headers()),
                    "request headers"
                );
            }
            if tracing::enabled!(tracing::Level::TRACE) {
                tracing::trace!(%call_id, curl = %record.to_curl(), "request as curl");
            }
        });
    }
}

impl Default for LoggingTransport<HttpTransport> {
    fn default() -> Self {
        Self::new(HttpTransport::new(), LoggingOptions::default())
    }
}

impl<T> std::fmt::Debug for LoggingTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingTransport")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Transport for LoggingTransport<T> {
    fn deliver(&self, request: Request<Body>) -> BoxFuture<'_, DeliverResult> {
        Box::pin(self.round_trip(request))
    }
}

impl<T: Transport> Service<Request<Body>> for LoggingTransport<T> {
    type Response = Response<Body>;
    type Error = TransportError;
    type Future = BoxFuture<'static, DeliverResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.round_trip(request).await })
    }
}

/// Builder over [`LoggingOptions`].
#[derive(Debug)]
pub struct LoggingTransportBuilder<T> {
    inner: T,
    options: LoggingOptions,
}

impl<T: Transport> LoggingTransportBuilder<T> {
    pub fn logger(mut self, logger: Logger) -> Self {
        self.options.logger = logger;
        self
    }

    /// Enable detailed phase timing reported at `level`.
    pub fn detailed_timing(mut self, level: TimingLevel) -> Self {
        self.options.detailed_timing = true;
        self.options.detailed_timing_level = level;
        self
    }

    pub fn options(mut self, options: LoggingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> LoggingTransport<T> {
        LoggingTransport::new(self.inner, self.options)
    }
}

/// Tower layer wrapping any [`Transport`] in a [`LoggingTransport`].
#[derive(Debug, Clone, Default)]
pub struct LoggingLayer {
    options: LoggingOptions,
}

impl LoggingLayer {
    pub fn new(options: LoggingOptions) -> Self {
        Self { options }
    }
}

impl<T: Transport> Layer<T> for LoggingLayer {
    type Service = LoggingTransport<T>;

    fn layer(&self, inner: T) -> Self::Service {
        LoggingTransport::new(inner, self.options.clone())
    }
}

/// In-flight call; finalizes and logs the record exactly once.
///
/// Dropped unfinished means the caller abandoned the call.
struct PendingCall<'a> {
    record: Arc<TraceRecord>,
    options: &'a LoggingOptions,
    started: Instant,
    finished: bool,
}

impl PendingCall<'_> {
    fn finish(&mut self, result: &DeliverResult) {
        let (outcome, headers) = match result {
            Ok(response) => (
                CallOutcome::status(response.status()),
                self.options
                    .detailed_timing
                    .then(|| response.headers().clone()),
            ),
            Err(error) => (CallOutcome::Error(error.to_string()), None),
        };
        self.finalize(outcome, headers);
    }

    fn finalize(&mut self, outcome: CallOutcome, headers: Option<HeaderMap>) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        let total = self.started.elapsed();
        if !self.record.complete(outcome, headers, total) {
            return;
        }

        let snapshot = self.record.snapshot();
        let call_id = snapshot.call_id;
        let duration_ms = as_millis(total);
        let level = self.options.detailed_timing_level;

        self.options.logger.emit(|| {
            tracing::info!(
                %call_id,
                method = %snapshot.method,
                url = %snapshot.url,
                status = snapshot.status(),
                error = snapshot.error(),
                duration_ms,
                "response"
            );

            if !self.options.detailed_timing {
                return;
            }

            let phases = snapshot.phases;
            event_at!(
                level,
                %call_id,
                connection_reused = phases.connection_reused,
                dns_lookup_ms = phases.dns_lookup.map(as_millis),
                dial_ms = phases.dialing.map(as_millis),
                tls_handshake_ms = phases.tls_handshake.map(as_millis),
                get_connection_ms = phases.get_connection.map(as_millis),
                server_processing_ms = phases.server_processing.map(as_millis),
                duration_ms,
                "HTTP statistics"
            );

            if let Some(headers) = &snapshot.response_headers {
                if tracing::enabled!(tracing::Level::DEBUG) {
                    tracing::debug!(
                        %call_id,
                        headers = %MaskedHeaders(headers),
                        "response headers"
                    );
                }
            }
        });
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finalize(CallOutcome::Error(TransportError::Cancelled.to_string()), None);
        }
    }
}
