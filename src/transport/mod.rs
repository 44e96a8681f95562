//! Outbound transport subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → logging.rs (LoggingTransport: snapshot, install hooks, log)
//!     → inner Transport (e.g. client.rs HttpTransport)
//!         → pool.rs (idle connection checkout)       ─┐
//!         → DNS / dial / tls.rs handshake             ├─ fire ClientTrace hooks
//!         → body.rs (request written, first byte)    ─┘
//!     ← response or TransportError, returned unchanged
//! ```
//!
//! # Design Decisions
//! - One `deliver` operation; decorators and real transports are
//!   interchangeable behind it
//! - Hooks travel in request extensions, never in globals
//! - The decorator observes; it never retries or rewrites outcomes

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use futures_util::future::BoxFuture;
use http::{Request, Response};

pub mod body;
pub mod client;
pub mod logging;
pub mod pool;
pub mod tls;

pub use client::HttpTransport;
pub use logging::{LoggingLayer, LoggingOptions, LoggingTransport};

/// Boxed error from lower layers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result of one delivery.
pub type DeliverResult = Result<Response<Body>, TransportError>;

/// Something that can carry a request to a server and bring back a response.
pub trait Transport: Send + Sync + 'static {
    fn deliver(&self, request: Request<Body>) -> BoxFuture<'_, DeliverResult>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn deliver(&self, request: Request<Body>) -> BoxFuture<'_, DeliverResult> {
        (**self).deliver(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn deliver(&self, request: Request<Body>) -> BoxFuture<'_, DeliverResult> {
        (**self).deliver(request)
    }
}

/// Failure to complete a call.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("invalid request URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("DNS lookup for {host} failed: {source}")]
    Dns {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dial {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dial {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("TLS handshake failed: {0}")]
    Tls(#[source] BoxError),

    #[error("HTTP exchange failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    pub(crate) fn invalid_uri(uri: &http::Uri, reason: impl Into<String>) -> Self {
        TransportError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }
}
