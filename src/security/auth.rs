//! Bearer token authentication.
//!
//! [`AuthGate::authenticate_request`] is advisory: it never blocks and turns
//! every failure into "no user". [`AuthGate::require_auth`] is the hard gate
//! that protected handlers call explicitly. Token verification itself is a
//! pluggable [`TokenVerifier`].

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::observability::metrics;

pub const AUTH_REQUIRED_MESSAGE: &str = "Authentication required";

const BEARER_PREFIX: &str = "Bearer ";

/// Identity decoded from a verified token. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

/// Why a token failed verification.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token expired")]
    TokenExpired,

    #[error("invalid token")]
    InvalidToken,
}

impl AuthError {
    fn reason(&self) -> &'static str {
        match self {
            AuthError::TokenExpired => "expired",
            AuthError::InvalidToken => "invalid",
        }
    }
}

/// Capability that turns a bearer token into an identity.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// Claims carried by HS256 access tokens.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
}

/// Verifies HS256 JWTs signed with a shared secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        Ok(AuthUser {
            user_id: data.claims.user_id,
            email: data.claims.email,
        })
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The prefix match is exact and case-sensitive; anything else is "no token".
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .filter(|token| !token.is_empty())
}

/// Terminal 401 response used by the hard gate.
pub fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": AUTH_REQUIRED_MESSAGE })),
    )
        .into_response()
}

pub struct AuthGate {
    verifier: Arc<dyn TokenVerifier>,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// Advisory authentication. Missing or bad credentials yield `None`.
    pub fn authenticate_request(&self, headers: &HeaderMap) -> Option<AuthUser> {
        let token = bearer_token(headers)?;
        match self.verifier.verify(token) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::debug!(error = %e, "Bearer token rejected");
                metrics::record_auth_failure(e.reason());
                None
            }
        }
    }

    /// Hard gate: the user, or a terminal 401 response.
    pub fn require_auth(&self, headers: &HeaderMap) -> Result<AuthUser, Response> {
        self.authenticate_request(headers)
            .ok_or_else(unauthorized_response)
    }
}

/// Extractor for handlers that accept anonymous callers.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    Arc<AuthGate>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<AuthGate>::from_ref(state);
        Ok(MaybeUser(gate.authenticate_request(&parts.headers)))
    }
}

/// Extractor for handlers that need an authenticated caller.
#[derive(Debug, Clone)]
pub struct RequireUser(pub AuthUser);

impl<S> FromRequestParts<S> for RequireUser
where
    Arc<AuthGate>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<AuthGate>::from_ref(state);
        gate.require_auth(&parts.headers).map(RequireUser)
    }
}
