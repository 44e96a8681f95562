//! `http-log`: issue a request through the logging transport.
//!
//! The request is sent twice so the second call shows connection reuse in
//! the timing breakdown.
//!
//! ```text
//! http-log [--config PATH] [--detailed-timing LEVEL] [--header K:V]... URL
//! ```

use std::path::PathBuf;

use axum::body::Body;
use clap::Parser;
use http::{HeaderName, HeaderValue, Request};

use http_log_transport::config::{load_config, TransportConfig};
use http_log_transport::observability::logging;
use http_log_transport::{HttpTransport, LoggingTransport, TimingLevel, Transport};

#[derive(Parser)]
#[command(name = "http-log")]
#[command(about = "Send an HTTP request through the logging transport", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable phase timing at this level (trace, debug, info, warn, error).
    #[arg(short, long)]
    detailed_timing: Option<TimingLevel>,

    /// Extra request header as `Name:Value`; repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TransportConfig::default(),
    };

    let logger = logging::init(&config.observability.log_level)?;

    let mut options = config.logging_options(logger);
    if let Some(level) = cli.detailed_timing {
        options.detailed_timing = true;
        options.detailed_timing_level = level;
    }

    let headers = cli
        .headers
        .iter()
        .map(|raw| parse_header(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let transport = LoggingTransport::new(
        HttpTransport::with_options(config.client_options()),
        options,
    );

    for _ in 0..2 {
        let mut builder = Request::get(cli.url.as_str());
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }
        let request = builder.body(Body::empty())?;

        let response = transport.deliver(request).await?;
        let status = response.status();
        if !status.is_success() {
            eprintln!("Error: server returned status {}", status);
        }
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        print_body(&body);
    }

    Ok(())
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), Box<dyn std::error::Error>> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("header '{raw}' is not in Name:Value form"))?;
    Ok((
        HeaderName::from_bytes(name.trim().as_bytes())?,
        HeaderValue::from_str(value.trim())?,
    ))
}

/// Pretty-print JSON bodies, everything else as text.
fn print_body(body: &[u8]) {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(json) => match serde_json::to_string_pretty(&json) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{}", json),
        },
        Err(_) => println!("{}", String::from_utf8_lossy(body)),
    }
}
