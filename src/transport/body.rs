//! Request body wrapper that reports when the body has been fully written.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use bytes::Bytes;
use http_body::{Frame, SizeHint};

use crate::trace::TraceContext;

/// Outbound request body that fires `wrote_request` once it is exhausted.
pub struct TracedBody {
    inner: Body,
    trace: Option<TraceContext>,
    reported: bool,
}

impl TracedBody {
    pub fn new(inner: Body, trace: Option<TraceContext>) -> Self {
        Self {
            inner,
            trace,
            reported: false,
        }
    }

    /// Fire `wrote_request` now if the body has nothing to send.
    ///
    /// The connection never polls an empty body, so the transport reports
    /// it when the request is handed over instead.
    pub fn report_if_empty(&mut self) {
        if http_body::Body::is_end_stream(&self.inner) {
            self.report(None);
        }
    }

    fn report(&mut self, error: Option<&axum::Error>) {
        if self.reported {
            return;
        }
        self.reported = true;
        if let Some(trace) = &self.trace {
            match error {
                Some(error) => trace.wrote_request(Some(error)),
                None => trace.wrote_request(None),
            }
        }
    }
}

impl http_body::Body for TracedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(None) => {
                this.report(None);
                Poll::Ready(None)
            }
            Poll::Ready(Some(Ok(frame))) => {
                // hyper stops polling a sized body once it reports end of stream.
                if this.inner.is_end_stream() {
                    this.report(None);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(error))) => {
                this.report(Some(&error));
                Poll::Ready(Some(Err(error)))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
