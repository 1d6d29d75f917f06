//! API endpoints behind the gate.
//!
//! These are thin collaborators: the task-tracking business logic and its
//! persistence live elsewhere. They never set CORS, security or rate-limit
//! headers; the gate owns those.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::security::{MaybeUser, RequireUser};

/// `GET /api/health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/session`: who the caller is, if anyone.
pub async fn session(MaybeUser(user): MaybeUser) -> impl IntoResponse {
    Json(json!({ "user": user }))
}

/// `GET /api/me`: requires a valid bearer token.
pub async fn me(RequireUser(user): RequireUser) -> impl IntoResponse {
    Json(user)
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
