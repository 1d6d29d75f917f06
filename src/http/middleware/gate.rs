//! Request gate middleware.
//!
//! Wraps every API handler in a fixed evaluation order:
//!
//! ```text
//! 1. pre-flight (OPTIONS)  → 204 + security headers, stop
//! 2. rate limit            → 429 + security headers, stop
//! 3. handler
//! 4. CORS headers for the request's origin
//! 5. security headers
//! 6. X-RateLimit-* from the store's current entry for this client
//! ```
//!
//! Nothing here can fail. Errors and panics raised by the handler are not
//! caught; they belong to the outer error boundary.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::config::GateConfig;
use crate::observability::metrics;
use crate::security::{
    client_key,
    cors::{self, OriginGate},
    RateLimitDecision, RateLimiter, SecurityHeaders,
};

/// Process-wide gate state, built once at startup.
pub struct RequestGate {
    origins: OriginGate,
    limiter: Arc<RateLimiter>,
    headers: SecurityHeaders,
}

impl RequestGate {
    pub fn new(origins: OriginGate, limiter: Arc<RateLimiter>, headers: SecurityHeaders) -> Self {
        Self {
            origins,
            limiter,
            headers,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            OriginGate::new(config.cors.allowed_origins.clone()),
            Arc::new(RateLimiter::new(&config.rate_limit)),
            SecurityHeaders::new(config.security.environment.is_production_like()),
        )
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn origins(&self) -> &OriginGate {
        &self.origins
    }
}

pub async fn gate_middleware(
    State(gate): State<Arc<RequestGate>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let origin = cors::request_origin(request.headers());

    if let Some(mut response) = gate.origins.preflight(&method, origin.as_deref()) {
        gate.headers.apply(response.headers_mut());
        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        return response;
    }

    let key = client_key(request.headers());
    let decision = gate.limiter.check(&key);
    if let RateLimitDecision::Rejected(status) = decision {
        let mut response = status.rejection_response();
        gate.headers.apply(response.headers_mut());
        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        return response;
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    gate.origins.apply(headers, origin.as_deref());
    gate.headers.apply(headers);
    // Another request from the same client may have moved the counter while
    // the handler ran; report what the store holds now.
    gate.limiter
        .snapshot(&key)
        .unwrap_or_else(|| decision.status())
        .apply_headers(headers);

    tracing::debug!(
        client = %key,
        method = %method,
        status = response.status().as_u16(),
        "Request passed gate"
    );
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
