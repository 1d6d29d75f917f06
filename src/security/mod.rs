//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (answer pre-flight, remember origin)
//!     → client_key.rs + rate_limit.rs (per-client fixed window)
//!     → handler (auth.rs on demand: advisory or hard gate)
//! Outgoing response:
//!     → cors.rs (allow-origin for matching origins)
//!     → headers.rs (hardening headers)
//!     → rate_limit.rs (X-RateLimit-* headers)
//! ```
//!
//! # Design Decisions
//! - Gate checks never fail: malformed client metadata degrades to defaults
//! - CORS never rejects; the browser enforces the missing allow-origin
//! - Shared state is limited to the rate-limit store; the allow-list is immutable

pub mod auth;
pub mod client_key;
pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use auth::{AuthGate, AuthUser, JwtVerifier, MaybeUser, RequireUser, TokenVerifier};
pub use client_key::client_key;
pub use cors::OriginGate;
pub use headers::SecurityHeaders;
pub use rate_limit::{
    Consistency, MemoryStore, RateLimitDecision, RateLimitStatus, RateLimitStore, RateLimiter,
};
