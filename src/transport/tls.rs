//! TLS client configuration.
//!
//! Native root certificates are loaded once per process and cached.

use std::sync::{Arc, OnceLock};

use rustls::pki_types::CertificateDer;

use crate::transport::TransportError;

static NATIVE_ROOTS_CACHE: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

fn load_native_certs() -> Vec<CertificateDer<'static>> {
    let result = rustls_native_certs::load_native_certs();
    for error in &result.errors {
        tracing::warn!(%error, "Error loading native root certificate");
    }
    if result.certs.is_empty() {
        tracing::warn!("No native root CA certificates found");
    } else {
        tracing::debug!(count = result.certs.len(), "Loaded native root certificates");
    }
    result.certs
}

/// Cached native root certificates (possibly empty).
pub fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS_CACHE.get_or_init(load_native_certs).as_slice()
}

/// Build a rustls client config trusting the native roots.
///
/// An empty root store is accepted; handshakes will then fail with an
/// unknown-issuer error that surfaces as the call's error.
pub fn client_config() -> Result<Arc<rustls::ClientConfig>, TransportError> {
    let mut roots = rustls::RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(native_root_certs().iter().cloned());
    if ignored > 0 {
        tracing::warn!(added, ignored, "Some native root certificates could not be parsed");
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::Tls(Box::new(e)))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_roots_cached() {
        let first = native_root_certs();
        let second = native_root_certs();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn client_config_builds_without_alpn() {
        let config = client_config().unwrap();
        assert!(config.alpn_protocols.is_empty());
    }
}
