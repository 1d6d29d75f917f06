//! Middleware that runs in front of every API handler.

pub mod gate;

pub use gate::{gate_middleware, RequestGate};
