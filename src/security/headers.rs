//! Security response headers.
//!
//! Headers are inserted, never appended, so applying the set twice yields the
//! same response as applying it once.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

const BASE_HEADERS: [(HeaderName, &str); 5] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (
        HeaderName::from_static("permissions-policy"),
        "camera=(), microphone=(), geolocation=(), interest-cohort=()",
    ),
];

pub const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains; preload";

/// The fixed hardening header set for this process.
#[derive(Debug, Clone, Copy)]
pub struct SecurityHeaders {
    hsts: bool,
}

impl SecurityHeaders {
    /// `production_like` enables Strict-Transport-Security.
    pub fn new(production_like: bool) -> Self {
        Self {
            hsts: production_like,
        }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in BASE_HEADERS {
            headers.insert(name, HeaderValue::from_static(value));
        }
        if self.hsts {
            headers.insert(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(HSTS_VALUE),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_headers() {
        let mut headers = HeaderMap::new();
        SecurityHeaders::new(false).apply(&mut headers);

        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::X_XSS_PROTECTION], "1; mode=block");
        assert_eq!(headers[header::REFERRER_POLICY], "strict-origin-when-cross-origin");
        assert_eq!(
            headers["permissions-policy"],
            "camera=(), microphone=(), geolocation=(), interest-cohort=()"
        );
        assert!(!headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    }

    #[test]
    fn test_production_adds_hsts() {
        let mut headers = HeaderMap::new();
        SecurityHeaders::new(true).apply(&mut headers);
        assert_eq!(headers[header::STRICT_TRANSPORT_SECURITY], HSTS_VALUE);
        assert_eq!(headers.len(), 6);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let injector = SecurityHeaders::new(true);
        let mut once = HeaderMap::new();
        injector.apply(&mut once);

        let mut twice = HeaderMap::new();
        injector.apply(&mut twice);
        injector.apply(&mut twice);

        assert_eq!(once, twice);
        for name in twice.keys() {
            assert_eq!(twice.get_all(name).iter().count(), 1);
        }
    }

    #[test]
    fn test_overwrites_existing_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        SecurityHeaders::new(false).apply(&mut headers);
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    }
}
