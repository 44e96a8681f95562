//! Instrumented outbound HTTP transport.
//!
//! Wraps any [`Transport`] so that every request and its outcome are logged
//! as structured `tracing` events, with credentials masked and, optionally,
//! a per-phase timing breakdown (DNS, dial, TLS, connection checkout, server
//! processing).

pub mod config;
pub mod observability;
pub mod security;
pub mod trace;
pub mod transport;

pub use config::schema::TransportConfig;
pub use observability::{Logger, TimingLevel};
pub use transport::{
    HttpTransport, LoggingLayer, LoggingOptions, LoggingTransport, Transport, TransportError,
};
