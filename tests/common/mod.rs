//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use http_log_transport::transport::pool::PoolKey;
use http_log_transport::{HttpTransport, Logger};

/// One event seen by a [`Capture`].
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Layer that stores every event so tests can inspect them.
#[derive(Clone, Default)]
pub struct Capture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger whose events land in this capture, all levels enabled.
    pub fn logger(&self) -> Logger {
        Logger::new(Dispatch::new(
            tracing_subscriber::registry().with(self.clone()),
        ))
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.message == message)
            .collect()
    }

    /// The single event carrying `message`; panics unless there is exactly one.
    pub fn one(&self, message: &str) -> CapturedEvent {
        let mut found = self.with_message(message);
        assert_eq!(found.len(), 1, "expected one '{message}' event, got {found:?}");
        found.remove(0)
    }
}

impl<S: Subscriber> Layer<S> for Capture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = BTreeMap::new();
        event.record(&mut FieldVisitor(&mut fields));
        let message = fields.remove("message").unwrap_or_default();
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message,
            fields,
        });
    }
}

struct FieldVisitor<'a>(&'a mut BTreeMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

/// Start a keep-alive API backend on an ephemeral port.
///
/// - `POST /items` answers `201 Created` with `{"title":"Test"}`
/// - `GET /items` answers `200 OK`
/// - `GET /slow` answers after two seconds
pub async fn start_api_backend() -> SocketAddr {
    let app = Router::new()
        .route(
            "/items",
            post(|body: String| async move {
                assert!(!body.is_empty());
                (
                    StatusCode::CREATED,
                    [(header::CONTENT_TYPE, "application/json")],
                    r#"{"title":"Test"}"#,
                )
            })
            .get(|| async { "items" }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "late"
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a raw backend that answers every connection once and closes it.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start an HTTPS backend serving a self-signed `localhost` certificate.
pub async fn start_tls_backend() -> SocketAddr {
    // Both rustls providers are compiled in; pick one for the server side.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = axum_server::tls_rustls::RustlsConfig::from_pem(
        include_bytes!("../fixtures/localhost.crt").to_vec(),
        include_bytes!("../fixtures/localhost.key").to_vec(),
    )
    .await
    .unwrap();

    let app = Router::new().route("/items", get(|| async { "items" }));
    let handle = axum_server::Handle::new();
    let server = axum_server::bind_rustls("127.0.0.1:0".parse().unwrap(), config)
        .handle(handle.clone())
        .serve(app.into_make_service());
    tokio::spawn(async move {
        let _ = server.await;
    });

    handle.listening().await.unwrap()
}

/// Poll until `url`'s destination has an idle connection, up to half a
/// second. Returns the idle count seen last.
pub async fn wait_for_idle(transport: &HttpTransport, url: &str) -> usize {
    let key = PoolKey::from_uri(&url.parse().unwrap()).unwrap();
    for _ in 0..100 {
        let idle = transport.pool().idle_count(&key);
        if idle > 0 {
            return idle;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    transport.pool().idle_count(&key)
}
