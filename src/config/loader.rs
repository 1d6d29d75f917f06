//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{Environment, GateConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then environment overrides, then
/// validation.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GateConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto a config.
///
/// `lookup` abstracts the process environment so tests can supply a map.
pub fn apply_env_overrides<F>(config: &mut GateConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(origins) = lookup("CORS_ORIGINS") {
        config.cors.allowed_origins = parse_origin_list(&origins);
    }
    if let Some(mode) = lookup("APP_ENV") {
        config.security.environment = Environment::from_env_value(&mode);
    }
    if let Some(value) = lookup("RATE_LIMIT_WINDOW_MS") {
        config.rate_limit.window_ms = parse_number("RATE_LIMIT_WINDOW_MS", value)?;
    }
    if let Some(value) = lookup("RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.max_requests = parse_number("RATE_LIMIT_MAX_REQUESTS", value)?;
    }
    if let Some(value) = lookup("RATE_LIMIT_SWEEP_SECS") {
        config.rate_limit.sweep_interval_secs = parse_number("RATE_LIMIT_SWEEP_SECS", value)?;
    }
    if let Some(secret) = lookup("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Some(addr) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    Ok(())
}

/// Split a comma-separated allow-list. Order is preserved; blanks are dropped.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_parse_origin_list() {
        assert_eq!(
            parse_origin_list(" http://a.example, ,https://b.example ,"),
            vec!["http://a.example", "https://b.example"]
        );
        assert!(parse_origin_list("").is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GateConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("CORS_ORIGINS", "https://app.example,https://admin.example"),
                ("APP_ENV", "production"),
                ("RATE_LIMIT_WINDOW_MS", "1000"),
                ("RATE_LIMIT_MAX_REQUESTS", "2"),
                ("JWT_SECRET", "s3cret"),
            ]),
        )
        .unwrap();

        assert_eq!(config.cors.allowed_origins.len(), 2);
        assert!(config.security.environment.is_production_like());
        assert_eq!(config.rate_limit.window_ms, 1000);
        assert_eq!(config.rate_limit.max_requests, 2);
        assert_eq!(config.auth.jwt_secret, "s3cret");
    }

    #[test]
    fn test_env_absent_keeps_defaults() {
        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, env(&[])).unwrap();
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:3000"]);
        assert!(!config.security.environment.is_production_like());
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let mut config = GateConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("RATE_LIMIT_MAX_REQUESTS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "RATE_LIMIT_MAX_REQUESTS", .. }));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("request-gate-{}.toml", std::process::id()));
        fs::write(&path, "[rate_limit]\nmax_requests = 7\n").unwrap();

        let config = load_config(Some(&path));
        std::fs::remove_file(&path).unwrap_or_default();

        assert_eq!(config.unwrap().rate_limit.max_requests, 7);
    }
}
