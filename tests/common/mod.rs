//! Shared utilities for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, Response},
    middleware,
    routing::any,
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use tower::ServiceExt;

use request_gate::config::GateConfig;
use request_gate::http::{gate_middleware, AppState, HttpServer, RequestGate};
use request_gate::security::auth::Claims;
use request_gate::security::rate_limit::ManualClock;
use request_gate::security::{
    AuthGate, JwtVerifier, MemoryStore, OriginGate, RateLimiter, SecurityHeaders,
};

pub const SECRET: &str = "integration-secret";
pub const ALLOWED_ORIGIN: &str = "http://localhost:3000";
pub const START_MS: u64 = 1_700_000_000_000;

pub struct TestGate {
    pub gate: Arc<RequestGate>,
    pub clock: Arc<ManualClock>,
}

pub fn test_gate(max_requests: u64, window_ms: u64, production: bool) -> TestGate {
    let clock = Arc::new(ManualClock::new(START_MS));
    let limiter = RateLimiter::with_parts(
        window_ms,
        max_requests,
        Arc::new(MemoryStore::new()),
        clock.clone(),
    );
    let gate = RequestGate::new(
        OriginGate::new(vec![ALLOWED_ORIGIN.to_string()]),
        Arc::new(limiter),
        SecurityHeaders::new(production),
    );
    TestGate {
        gate: Arc::new(gate),
        clock,
    }
}

/// The full server router around a test gate.
pub fn server_router(gate: &TestGate) -> Router {
    let state = AppState {
        gate: gate.gate.clone(),
        auth: Arc::new(AuthGate::new(Arc::new(JwtVerifier::new(SECRET)))),
    };
    HttpServer::with_state(GateConfig::default(), state).router()
}

/// A gated router whose only handler counts its invocations.
#[allow(dead_code)]
pub fn counting_router(gate: &TestGate) -> (Router, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new()
        .route(
            "/api/tasks",
            any(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "tasks"
                }
            }),
        )
        .layer(middleware::from_fn_with_state(gate.gate.clone(), gate_middleware));
    (router, calls)
}

pub fn request(method: Method, uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[allow(dead_code)]
pub fn mint_token(user_id: i64, email: &str) -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    let claims = Claims {
        user_id,
        email: email.to_string(),
        exp: now + 3600,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}
