//! Advisory and mandatory authentication through the gated router.

use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::*;

#[tokio::test]
async fn test_me_requires_token() {
    let gate = test_gate(100, 60_000, false);
    let router = server_router(&gate);

    let response = send(&router, request(Method::GET, "/api/me", &[])).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    // The gate still decorates handler rejections.
    assert_eq!(header(&response, "x-content-type-options"), Some("nosniff"));
    assert_eq!(body_json(response).await, json!({ "error": "Authentication required" }));
}

#[tokio::test]
async fn test_me_with_valid_token() {
    let gate = test_gate(100, 60_000, false);
    let router = server_router(&gate);
    let bearer = format!("Bearer {}", mint_token(42, "grace@example.com"));

    let response = send(
        &router,
        request(Method::GET, "/api/me", &[("authorization", bearer.as_str())]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "userId": 42, "email": "grace@example.com" })
    );
}

#[tokio::test]
async fn test_me_rejects_malformed_prefix() {
    let gate = test_gate(100, 60_000, false);
    let router = server_router(&gate);
    let token = format!("Token {}", mint_token(42, "grace@example.com"));

    let response = send(
        &router,
        request(Method::GET, "/api/me", &[("authorization", token.as_str())]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_is_advisory() {
    let gate = test_gate(100, 60_000, false);
    let router = server_router(&gate);

    let anonymous = send(&router, request(Method::GET, "/api/session", &[])).await;
    assert_eq!(anonymous.status(), StatusCode::OK);
    assert_eq!(body_json(anonymous).await, json!({ "user": null }));

    let bad = send(
        &router,
        request(Method::GET, "/api/session", &[("authorization", "Bearer garbage")]),
    )
    .await;
    assert_eq!(bad.status(), StatusCode::OK);
    assert_eq!(body_json(bad).await, json!({ "user": null }));

    let bearer = format!("Bearer {}", mint_token(1, "ada@example.com"));
    let known = send(
        &router,
        request(Method::GET, "/api/session", &[("authorization", bearer.as_str())]),
    )
    .await;
    assert_eq!(
        body_json(known).await,
        json!({ "user": { "userId": 1, "email": "ada@example.com" } })
    );
}

#[tokio::test]
async fn test_rate_limit_runs_before_auth() {
    let gate = test_gate(1, 60_000, false);
    let router = server_router(&gate);
    let headers = [("x-forwarded-for", "7.7.7.7")];

    let first = send(&router, request(Method::GET, "/api/me", &headers)).await;
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

    let second = send(&router, request(Method::GET, "/api/me", &headers)).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}
