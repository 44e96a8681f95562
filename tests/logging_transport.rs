//! End-to-end tests for the logging transport over real sockets.

use std::collections::HashSet;
use std::time::Duration;

use axum::body::Body;
use http::{Request, StatusCode};
use http_log_transport::transport::client::ClientOptions;
use http_log_transport::{
    HttpTransport, LoggingTransport, TimingLevel, Transport, TransportError,
};

mod common;
use common::Capture;

fn detailed(capture: &Capture) -> LoggingTransport {
    LoggingTransport::builder(HttpTransport::new())
        .logger(capture.logger())
        .detailed_timing(TimingLevel::Info)
        .build()
}

async fn read_body(response: http::Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn created_response_is_summarized() {
    let addr = common::start_api_backend().await;
    let capture = Capture::new();
    let transport = detailed(&capture);

    let request = Request::post(format!("http://{addr}/items"))
        .header("content-type", "application/json")
        .header("authorization", "Bearer s3cr3t")
        .body(Body::from(r#"{"title":"Test"}"#))
        .unwrap();

    let response = transport.deliver(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_body(response).await, r#"{"title":"Test"}"#);

    let summary = capture.one("response");
    assert_eq!(summary.field("status"), Some("201 Created"));
    assert_eq!(summary.field("error"), None);
    assert_eq!(summary.field("method"), Some("POST"));
    assert!(summary.field("duration_ms").unwrap().parse::<u64>().is_ok());

    let stats = capture.one("HTTP statistics");
    assert_eq!(stats.level, tracing::Level::INFO);
    assert_eq!(stats.field("connection_reused"), Some("false"));
    assert!(stats.field("dial_ms").is_some());
    assert!(stats.field("server_processing_ms").is_some());
    // IP literal: no lookup, plain http: no handshake.
    assert!(stats.field("dns_lookup_ms").is_none());
    assert!(stats.field("tls_handshake_ms").is_none());
    assert!(stats.field("get_connection_ms").is_none());

    let headers = capture.one("request headers");
    let dumped = headers.field("headers").unwrap();
    assert!(dumped.contains("Bearer <masked>"));
    assert!(!dumped.contains("s3cr3t"));
    assert!(!capture.one("request as curl").field("curl").unwrap().contains("s3cr3t"));

    assert_eq!(capture.with_message("response headers").len(), 1);
}

#[tokio::test]
async fn dns_failure_reports_lookup_only() {
    let capture = Capture::new();
    let transport = detailed(&capture);

    let request = Request::get("http://nonexistent.invalid/")
        .body(Body::empty())
        .unwrap();
    let err = transport.deliver(request).await.unwrap_err();
    assert!(matches!(err, TransportError::Dns { .. }));

    let summary = capture.one("response");
    assert!(summary.field("error").unwrap().contains("nonexistent.invalid"));
    assert_eq!(summary.field("status"), None);

    let stats = capture.one("HTTP statistics");
    assert!(stats.field("dns_lookup_ms").is_some());
    assert!(stats.field("dial_ms").is_none());
    assert!(stats.field("tls_handshake_ms").is_none());
    assert!(stats.field("server_processing_ms").is_none());

    assert_eq!(capture.with_message("HTTP trace: DNS lookup failed").len(), 1);
    assert!(capture.with_message("response headers").is_empty());
}

#[tokio::test]
async fn second_call_reuses_connection() {
    let addr = common::start_api_backend().await;
    let capture = Capture::new();
    let transport = detailed(&capture);

    let url = format!("http://{addr}/items");
    for call in 0..2 {
        let request = Request::get(&url).body(Body::empty()).unwrap();
        let response = transport.deliver(request).await.unwrap();
        assert_eq!(read_body(response).await, "items");
        if call == 0 {
            assert_eq!(common::wait_for_idle(transport.inner(), &url).await, 1);
        }
    }

    let stats = capture.with_message("HTTP statistics");
    assert_eq!(stats.len(), 2);

    assert_eq!(stats[0].field("connection_reused"), Some("false"));
    assert!(stats[0].field("dial_ms").is_some());

    let reused = &stats[1];
    assert_eq!(reused.field("connection_reused"), Some("true"));
    assert!(reused.field("get_connection_ms").is_some());
    assert!(reused.field("server_processing_ms").is_some());
    assert!(reused.field("dns_lookup_ms").is_none());
    assert!(reused.field("dial_ms").is_none());
    assert!(reused.field("tls_handshake_ms").is_none());

    assert_eq!(capture.with_message("HTTP trace: dial succeeded").len(), 1);
}

#[tokio::test]
async fn cancelled_call_is_summarized_once() {
    let addr = common::start_api_backend().await;
    let capture = Capture::new();
    let transport = detailed(&capture);

    let request = Request::get(format!("http://{addr}/slow"))
        .body(Body::empty())
        .unwrap();
    let outcome = tokio::time::timeout(Duration::from_millis(200), transport.deliver(request)).await;
    assert!(outcome.is_err());

    let summary = capture.one("response");
    assert_eq!(summary.field("error"), Some("request cancelled"));
    assert_eq!(summary.field("status"), None);
    assert_eq!(capture.with_message("HTTP statistics").len(), 1);
}

#[tokio::test]
async fn concurrent_calls_get_their_own_records() {
    let addr = common::start_api_backend().await;
    let capture = Capture::new();
    let transport = detailed(&capture);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let transport = transport.clone();
        handles.push(tokio::spawn(async move {
            let request = Request::get(format!("http://{addr}/items"))
                .body(Body::empty())
                .unwrap();
            let response = transport.deliver(request).await.unwrap();
            read_body(response).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), "items");
    }

    let summaries = capture.with_message("response");
    assert_eq!(summaries.len(), 16);
    let ids: HashSet<_> = summaries
        .iter()
        .map(|event| event.field("call_id").unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 16);
    assert!(summaries
        .iter()
        .all(|event| event.field("status") == Some("200 OK")));
    assert_eq!(capture.with_message("HTTP statistics").len(), 16);
}

#[tokio::test]
async fn refused_dial_passes_error_through() {
    let addr = common::closed_port().await;
    let capture = Capture::new();
    let transport = detailed(&capture);

    let request = Request::get(format!("http://{addr}/"))
        .body(Body::empty())
        .unwrap();
    let err = transport.deliver(request).await.unwrap_err();
    assert!(matches!(err, TransportError::Connect { .. }));

    let summary = capture.one("response");
    assert!(summary.field("error").unwrap().starts_with("dial "));

    let failed = capture.one("HTTP trace: dial failed");
    assert_eq!(failed.field("addr"), Some(addr.to_string().as_str()));
    assert!(capture.one("HTTP statistics").field("dial_ms").is_some());
}

#[tokio::test]
async fn plain_logging_skips_timing() {
    let addr = common::start_mock_backend("hello").await;
    let capture = Capture::new();
    let transport = LoggingTransport::builder(HttpTransport::new())
        .logger(capture.logger())
        .build();

    let request = Request::get(format!("http://{addr}/"))
        .body(Body::empty())
        .unwrap();
    let response = transport.deliver(request).await.unwrap();
    assert_eq!(read_body(response).await, "hello");

    assert_eq!(capture.one("response").field("status"), Some("200 OK"));
    assert!(capture.with_message("HTTP statistics").is_empty());
    assert!(capture
        .events()
        .iter()
        .all(|event| !event.message.starts_with("HTTP trace")));
}

#[tokio::test]
async fn closed_connections_are_not_reused() {
    let addr = common::start_mock_backend("bye").await;
    let capture = Capture::new();
    let inner = HttpTransport::with_options(ClientOptions {
        connect_timeout: Duration::from_secs(1),
        ..ClientOptions::default()
    });
    let transport = LoggingTransport::builder(inner)
        .logger(capture.logger())
        .detailed_timing(TimingLevel::Debug)
        .build();

    let url = format!("http://{addr}/");
    for _ in 0..2 {
        let request = Request::get(&url).body(Body::empty()).unwrap();
        let response = transport.deliver(request).await.unwrap();
        assert_eq!(read_body(response).await, "bye");
        assert_eq!(common::wait_for_idle(transport.inner(), &url).await, 0);
    }

    let stats = capture.with_message("HTTP statistics");
    assert_eq!(stats.len(), 2);
    assert!(stats
        .iter()
        .all(|event| event.field("connection_reused") == Some("false")));
    assert!(stats.iter().all(|event| event.level == tracing::Level::DEBUG));
}

#[tokio::test]
async fn untrusted_certificate_fails_handshake() {
    let addr = common::start_tls_backend().await;
    let capture = Capture::new();
    let transport = detailed(&capture);

    let request = Request::get(format!("https://{addr}/items"))
        .body(Body::empty())
        .unwrap();
    let err = transport.deliver(request).await.unwrap_err();
    assert!(matches!(err, TransportError::Tls(_)), "unexpected error: {err}");

    let summary = capture.one("response");
    assert!(summary
        .field("error")
        .unwrap()
        .starts_with("TLS handshake failed"));
    assert_eq!(summary.field("status"), None);

    let stats = capture.one("HTTP statistics");
    assert!(stats.field("dial_ms").is_some());
    assert!(stats.field("tls_handshake_ms").is_some());
    assert!(stats.field("dns_lookup_ms").is_none());
    assert!(stats.field("server_processing_ms").is_none());
    assert_eq!(capture.with_message("HTTP trace: dial succeeded").len(), 1);
}

#[tokio::test]
async fn tls_dial_errors_stay_dial_errors() {
    let addr = common::closed_port().await;
    let capture = Capture::new();
    let transport = detailed(&capture);

    let request = Request::get(format!("https://{addr}/"))
        .body(Body::empty())
        .unwrap();
    let err = transport.deliver(request).await.unwrap_err();
    assert!(matches!(err, TransportError::Connect { .. }), "unexpected error: {err}");

    let stats = capture.one("HTTP statistics");
    assert!(stats.field("dial_ms").is_some());
    assert!(stats.field("tls_handshake_ms").is_none());
}
