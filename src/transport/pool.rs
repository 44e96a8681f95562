//! Idle connection pool for [`HttpTransport`](super::HttpTransport).
//!
//! # Responsibilities
//! - Key connections by scheme, host and port
//! - Hand out idle connections that are ready for another request
//! - Cap idle connections per host and expire stale ones
//!
//! # Design Decisions
//! - A connection is only checked in once its previous response finished
//!   (`SendRequest::ready`), so every idle entry is immediately usable
//! - LIFO checkout keeps the warmest connection in use

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use http::uri::Scheme;
use http::Uri;
use hyper::client::conn::http1::SendRequest;

use crate::transport::body::TracedBody;
use crate::transport::TransportError;

/// Global counter for outbound connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an outbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    https: bool,
    host: String,
    port: u16,
}

impl PoolKey {
    pub fn from_uri(uri: &Uri) -> Result<Self, TransportError> {
        let https = match uri.scheme() {
            Some(scheme) if *scheme == Scheme::HTTPS => true,
            Some(scheme) if *scheme == Scheme::HTTP => false,
            Some(scheme) => {
                return Err(TransportError::invalid_uri(
                    uri,
                    format!("unsupported scheme '{scheme}'"),
                ))
            }
            None => return Err(TransportError::invalid_uri(uri, "missing scheme")),
        };
        let host = match uri.host() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(TransportError::invalid_uri(uri, "missing host")),
        };
        let port = uri.port_u16().unwrap_or(if https { 443 } else { 80 });

        Ok(Self { https, host, port })
    }

    pub fn is_https(&self) -> bool {
        self.https
    }

    /// Host as written in the URI (IPv6 literals keep their brackets).
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A live HTTP/1 connection.
pub struct Connection {
    pub id: ConnectionId,
    pub sender: SendRequest<TracedBody>,
}

/// Connection taken from the pool.
pub struct Checkout {
    pub conn: Connection,
    pub idle_time: Duration,
}

struct IdleConnection {
    conn: Connection,
    idle_since: Instant,
}

/// Idle connections keyed by destination.
pub struct Pool {
    idle: DashMap<PoolKey, Vec<IdleConnection>>,
    max_idle_per_host: usize,
    idle_timeout: Duration,
}

impl Pool {
    pub fn new(max_idle_per_host: usize, idle_timeout: Duration) -> Self {
        Self {
            idle: DashMap::new(),
            max_idle_per_host,
            idle_timeout,
        }
    }

    /// Take the most recently returned usable connection for `key`.
    pub fn checkout(&self, key: &PoolKey) -> Option<Checkout> {
        let found = {
            let mut idle = self.idle.get_mut(key)?;
            let mut found = None;
            while let Some(entry) = idle.pop() {
                let idle_time = entry.idle_since.elapsed();
                if entry.conn.sender.is_closed() || idle_time > self.idle_timeout {
                    tracing::trace!(connection_id = %entry.conn.id, "Discarding stale idle connection");
                    continue;
                }
                if entry.conn.sender.is_ready() {
                    found = Some(Checkout {
                        conn: entry.conn,
                        idle_time,
                    });
                    break;
                }
            }
            found
        };
        self.idle.remove_if(key, |_, idle| idle.is_empty());
        found
    }

    /// Return a connection whose previous exchange has completed.
    pub fn checkin(&self, key: PoolKey, conn: Connection) {
        if self.max_idle_per_host == 0 || conn.sender.is_closed() {
            return;
        }
        let mut idle = self.idle.entry(key).or_default();
        idle.retain(|entry| !entry.conn.sender.is_closed());
        if idle.len() >= self.max_idle_per_host {
            tracing::trace!(connection_id = %conn.id, "Idle pool full, closing connection");
            return;
        }
        idle.push(IdleConnection {
            conn,
            idle_since: Instant::now(),
        });
    }

    /// Number of destinations with at least one idle connection.
    pub fn host_count(&self) -> usize {
        self.idle.len()
    }

    /// Number of idle connections held for `key`.
    pub fn idle_count(&self, key: &PoolKey) -> usize {
        self.idle.get(key).map_or(0, |idle| idle.len())
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("hosts", &self.idle.len())
            .field("max_idle_per_host", &self.max_idle_per_host)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}
