//! HTTP/1.1 network transport.
//!
//! # Responsibilities
//! - Resolve, dial and (for `https`) TLS-wrap fresh connections
//! - Reuse idle connections from the pool
//! - Report every lifecycle step to the request's [`TraceContext`]
//!
//! # Design Decisions
//! - Built on hyper's connection-level client so pool checkout and connection
//!   setup are observable separately
//! - No retries and no redirects: one request, one exchange

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use futures_util::future::BoxFuture;
use http::header::HOST;
use http::uri::Scheme;
use http::{HeaderValue, Request, Uri};
use hyper_rustls::{HttpsConnectorBuilder, MaybeHttpsStream};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tower::{Service, ServiceExt};

use crate::trace::{ClientTrace, GotConnInfo, NoopTrace, TraceContext};
use crate::transport::body::TracedBody;
use crate::transport::pool::{Connection, ConnectionId, Pool, PoolKey};
use crate::transport::{tls, BoxError, DeliverResult, Transport, TransportError};

type Stream = MaybeHttpsStream<TokioIo<TcpStream>>;

/// Tunables for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Deadline for a single TCP dial attempt.
    pub connect_timeout: Duration,
    /// Maximum idle connections kept per destination.
    pub max_idle_per_host: usize,
    /// Idle connections older than this are discarded on checkout.
    pub idle_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            max_idle_per_host: 32,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

struct Inner {
    pool: Pool,
    tls: Option<Arc<rustls::ClientConfig>>,
    options: ClientOptions,
}

/// Pooled HTTP/1.1 transport that fires [`ClientTrace`] hooks.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<Inner>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_options(ClientOptions::default())
    }

    pub fn with_options(options: ClientOptions) -> Self {
        let tls = match tls::client_config() {
            Ok(config) => Some(config),
            Err(error) => {
                tracing::error!(%error, "TLS client configuration failed, https is disabled");
                None
            }
        };
        Self {
            inner: Arc::new(Inner {
                pool: Pool::new(options.max_idle_per_host, options.idle_timeout),
                tls,
                options,
            }),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub fn pool(&self) -> &Pool {
        &self.inner.pool
    }

    async fn send(&self, request: Request<Body>) -> DeliverResult {
        let trace = TraceContext::of(&request);
        let hooks: &dyn ClientTrace = trace.as_deref().unwrap_or(&NoopTrace);

        let key = PoolKey::from_uri(request.uri())?;
        hooks.get_conn(&key.host_port());

        let mut conn = match self.inner.pool.checkout(&key) {
            Some(checkout) => {
                hooks.got_conn(GotConnInfo {
                    reused: true,
                    idle_time: Some(checkout.idle_time),
                });
                checkout.conn
            }
            None => {
                let conn = self.connect(&key, request.uri(), trace.clone()).await?;
                hooks.got_conn(GotConnInfo {
                    reused: false,
                    idle_time: None,
                });
                conn
            }
        };

        let (mut parts, body) = request.into_parts();
        if !parts.headers.contains_key(HOST) {
            if let Some(authority) = parts.uri.authority() {
                if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
                    parts.headers.insert(HOST, host);
                }
            }
        }
        parts.uri = origin_form(&parts.uri)?;

        let mut body = TracedBody::new(body, trace.clone());
        body.report_if_empty();

        tracing::trace!(connection_id = %conn.id, host = %key.host_port(), "Sending request");
        let response = conn
            .sender
            .send_request(Request::from_parts(parts, body))
            .await?;
        hooks.got_first_response_byte();

        self.release_when_ready(key, conn);

        Ok(response.map(Body::new))
    }

    /// Return the connection to the pool once its current exchange is done.
    fn release_when_ready(&self, key: PoolKey, mut conn: Connection) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if conn.sender.ready().await.is_ok() {
                inner.pool.checkin(key, conn);
            }
        });
    }

    async fn connect(
        &self,
        key: &PoolKey,
        uri: &Uri,
        trace: Option<TraceContext>,
    ) -> Result<Connection, TransportError> {
        let hooks: &dyn ClientTrace = trace.as_deref().unwrap_or(&NoopTrace);
        let dialer = Dialer {
            trace: trace.clone(),
            connect_timeout: self.inner.options.connect_timeout,
        };

        let stream: Stream = if key.is_https() {
            let tls = self
                .inner
                .tls
                .as_ref()
                .ok_or_else(|| TransportError::Tls("no TLS client configuration".into()))?;
            let connector = HttpsConnectorBuilder::new()
                .with_tls_config((**tls).clone())
                .https_only()
                .enable_http1()
                .wrap_connector(dialer);
            let result = connector.oneshot(uri.clone()).await;
            match result {
                Ok(stream) => {
                    hooks.tls_handshake_done(None);
                    stream
                }
                Err(error) => return Err(handshake_error(error, hooks)),
            }
        } else {
            MaybeHttpsStream::Http(dialer.dial(key).await?)
        };

        let (sender, driver) = hyper::client::conn::http1::handshake(stream).await?;
        let id = ConnectionId::new();
        tokio::spawn(async move {
            if let Err(error) = driver.await {
                tracing::debug!(connection_id = %id, %error, "Connection closed with error");
            }
        });
        tracing::debug!(connection_id = %id, host = %key.host_port(), "Connection established");

        Ok(Connection { id, sender })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("pool", &self.inner.pool)
            .field("tls", &self.inner.tls.is_some())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Transport for HttpTransport {
    fn deliver(&self, request: Request<Body>) -> BoxFuture<'_, DeliverResult> {
        Box::pin(self.send(request))
    }
}

/// Errors from our own dialer pass through; anything else is the handshake.
fn handshake_error(error: BoxError, hooks: &dyn ClientTrace) -> TransportError {
    match error.downcast::<TransportError>() {
        Ok(dial_error) => *dial_error,
        Err(error) => {
            hooks.tls_handshake_done(Some(&*error));
            TransportError::Tls(error)
        }
    }
}

fn origin_form(uri: &Uri) -> Result<Uri, TransportError> {
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    path.parse()
        .map_err(|e: http::uri::InvalidUri| TransportError::invalid_uri(uri, e.to_string()))
}

/// Resolves and dials one destination, firing DNS and dial hooks.
///
/// Also the inner connector for TLS: it starts the handshake timer once the
/// TCP connection is up.
#[derive(Clone)]
struct Dialer {
    trace: Option<TraceContext>,
    connect_timeout: Duration,
}

impl Dialer {
    fn hooks(&self) -> &dyn ClientTrace {
        self.trace.as_deref().unwrap_or(&NoopTrace)
    }

    async fn dial(&self, key: &PoolKey) -> Result<TokioIo<TcpStream>, TransportError> {
        let addrs = self.resolve(key).await?;
        let hooks = self.hooks();

        let mut last_error = None;
        for addr in addrs {
            hooks.connect_start("tcp", addr);
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    hooks.connect_done("tcp", addr, None);
                    let _ = stream.set_nodelay(true);
                    return Ok(TokioIo::new(stream));
                }
                Ok(Err(source)) => {
                    hooks.connect_done("tcp", addr, Some(&source));
                    last_error = Some(TransportError::Connect {
                        addr: addr.to_string(),
                        source,
                    });
                }
                Err(_) => {
                    let timed_out = io::Error::new(io::ErrorKind::TimedOut, "dial timed out");
                    hooks.connect_done("tcp", addr, Some(&timed_out));
                    last_error = Some(TransportError::ConnectTimeout {
                        addr: addr.to_string(),
                        timeout: self.connect_timeout,
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| TransportError::Connect {
            addr: key.host_port(),
            source: io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses to dial"),
        }))
    }

    async fn resolve(&self, key: &PoolKey) -> Result<Vec<SocketAddr>, TransportError> {
        let host = key.host().trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, key.port())]);
        }

        let hooks = self.hooks();
        hooks.dns_start(host);
        let lookup = tokio::net::lookup_host((host, key.port()))
            .await
            .map(|addrs| addrs.collect::<Vec<_>>())
            .and_then(|addrs| {
                if addrs.is_empty() {
                    Err(io::Error::new(io::ErrorKind::NotFound, "no addresses found"))
                } else {
                    Ok(addrs)
                }
            });

        match lookup {
            Ok(addrs) => {
                hooks.dns_done(Ok(addrs.as_slice()));
                Ok(addrs)
            }
            Err(source) => {
                hooks.dns_done(Err(&source));
                Err(TransportError::Dns {
                    host: host.to_string(),
                    source,
                })
            }
        }
    }
}

impl Service<Uri> for Dialer {
    type Response = TokioIo<TcpStream>;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let dialer = self.clone();
        Box::pin(async move {
            let key = PoolKey::from_uri(&uri)?;
            let stream = dialer.dial(&key).await?;
            if uri.scheme() == Some(&Scheme::HTTPS) {
                dialer.hooks().tls_handshake_start();
            }
            Ok(stream)
        })
    }
}
