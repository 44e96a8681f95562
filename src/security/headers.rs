//! Credential masking for logged headers.
//!
//! # Responsibilities
//! - Redact credentials carried in the `Authorization` header
//! - Render whole header maps with every value passed through the mask
//!
//! # Design Decisions
//! - Only `Authorization` is touched; all other headers pass through
//! - Unknown auth schemes are masked entirely, scheme included
//! - Masking is infallible: non-UTF-8 values are rendered lossily

use std::borrow::Cow;
use std::fmt;

use http::HeaderMap;

/// Replacement text for redacted credentials.
pub const MASKED: &str = "<masked>";

/// Auth schemes whose name is safe to keep in logs.
const KNOWN_AUTH_SCHEMES: [&str; 3] = ["bearer", "basic", "negotiate"];

/// Mask credential content of a header value.
///
/// ```
/// use http_log_transport::security::mask_value;
///
/// assert_eq!(mask_value("Authorization", "Bearer abc123"), "Bearer <masked>");
/// assert_eq!(mask_value("Accept", "text/plain"), "text/plain");
/// ```
pub fn mask_value<'a>(name: &str, value: &'a str) -> Cow<'a, str> {
    if !name.eq_ignore_ascii_case(http::header::AUTHORIZATION.as_str()) {
        return Cow::Borrowed(value);
    }
    if value.is_empty() {
        return Cow::Borrowed("");
    }

    let scheme = match value.find(' ') {
        Some(i) if i > 0 => &value[..i],
        _ => value,
    };

    if !KNOWN_AUTH_SCHEMES
        .iter()
        .any(|known| scheme.eq_ignore_ascii_case(known))
    {
        return Cow::Borrowed(MASKED);
    }

    if value.len() > scheme.len() + 1 {
        Cow::Owned(format!("{scheme} {MASKED}"))
    } else {
        Cow::Borrowed(scheme)
    }
}

/// Header map adapter that masks every value when formatted.
///
/// Values are only walked when a log formatter actually renders the field.
#[derive(Clone, Copy)]
pub struct MaskedHeaders<'a>(pub &'a HeaderMap);

impl<'a> MaskedHeaders<'a> {
    /// Masked `(name, value)` pairs in map order.
    pub fn pairs(self) -> impl Iterator<Item = (&'a str, String)> + 'a {
        self.0.iter().map(|(name, value)| {
            let raw = String::from_utf8_lossy(value.as_bytes());
            (name.as_str(), mask_value(name.as_str(), &raw).into_owned())
        })
    }
}

impl fmt::Debug for MaskedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.pairs()).finish()
    }
}

impl fmt::Display for MaskedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
