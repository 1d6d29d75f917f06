//! Origin gate: cross-origin allow-list and pre-flight handling.
//!
//! Matching is exact string equality. No wildcards, no subdomain matching,
//! no case normalization. CORS never rejects a request on its own; a
//! non-matching origin simply gets no allow-origin header.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, Response, StatusCode},
};

use crate::observability::metrics;

pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-Requested-With, Accept";
pub const PREFLIGHT_MAX_AGE_SECS: &str = "86400";

/// Immutable origin allow-list.
#[derive(Debug, Clone)]
pub struct OriginGate {
    allow_list: Vec<String>,
}

impl OriginGate {
    pub fn new(allow_list: Vec<String>) -> Self {
        Self { allow_list }
    }

    pub fn allow_list(&self) -> &[String] {
        &self.allow_list
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allow_list.iter().any(|allowed| allowed == origin)
    }

    /// Answer a pre-flight request.
    ///
    /// Returns a terminal 204 for `OPTIONS`, `None` for every other method.
    pub fn preflight(&self, method: &Method, origin: Option<&str>) -> Option<Response<Body>> {
        if method != Method::OPTIONS {
            return None;
        }

        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;

        let headers = response.headers_mut();
        let allowed = self.apply(headers, origin);
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
        );

        tracing::debug!(origin = ?origin, allowed, "Answered pre-flight request");
        metrics::record_preflight(allowed);
        Some(response)
    }

    /// Merge CORS headers into a response.
    ///
    /// Allow-origin and credentials are set only for a matching origin;
    /// the method and header lists are always set. Returns whether the
    /// origin matched.
    pub fn apply(&self, headers: &mut HeaderMap, origin: Option<&str>) -> bool {
        let matched = origin.filter(|o| self.is_allowed(o));

        if let Some(origin) = matched {
            if let Ok(value) = HeaderValue::from_str(origin) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                );
            }
        }

        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );

        matched.is_some()
    }
}

/// Read the `Origin` header. Non-UTF8 values are treated as absent.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
