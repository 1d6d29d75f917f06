//! Client identification for rate limiting.

use axum::http::HeaderMap;

/// Key used when no forwarding header identifies the caller.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Extract the client key from forwarding headers.
///
/// Checks X-Forwarded-For (first hop) and then X-Real-IP. Missing, empty or
/// non-UTF8 values fall through; the final fallback is [`UNKNOWN_CLIENT`].
/// Callers behind NAT or shared proxies collapse onto one key.
pub fn client_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}
