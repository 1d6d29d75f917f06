//! Request gate: CORS, per-client rate limiting, security headers and
//! bearer authentication in front of an Axum API.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GateConfig;
pub use http::{HttpServer, RequestGate};
pub use lifecycle::Shutdown;
