//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and the origin
//! allow-list. All errors are collected, not just the first.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{GateConfig, PLACEHOLDER_JWT_SECRET};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rate_limit.window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.window_ms", "must be greater than 0"));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    for (i, origin) in config.cors.allowed_origins.iter().enumerate() {
        let field = format!("cors.allowed_origins[{}]", i);
        if origin.is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        } else if !(origin.starts_with("http://") || origin.starts_with("https://")) {
            errors.push(ValidationError::new(field, "must use the http or https scheme"));
        } else if origin.ends_with('/') {
            // Browsers never send a trailing slash, so this entry could never match.
            errors.push(ValidationError::new(field, "must not end with '/'"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address like 0.0.0.0:9090",
        ));
    }

    if config.security.environment.is_production_like() {
        let secret = config.auth.jwt_secret.as_str();
        if secret.is_empty() || secret == PLACEHOLDER_JWT_SECRET {
            errors.push(ValidationError::new(
                "auth.jwt_secret",
                "must be set to a real secret in production",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
