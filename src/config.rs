//! Gateway configuration loaded from environment.

use reqwest::Url;

/// Fallback for local development against a gateway on the default port.
const DEFAULT_API_BASE: &str = "http://localhost:5000/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid API_BASE_URL: {0}")]
    InvalidBaseUrl(String),
}

/// Where the remote API gateway lives and how cookies should be flagged.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway origin. Always ends with a trailing slash so relative joins
    /// preserve any path prefix.
    pub base: Url,
    /// Whether cookies minted by the edge guard carry the `Secure` flag.
    pub cookie_secure: bool,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let cookie_secure = base.scheme() == "https";
        Self { base, cookie_secure }
    }

    /// Load from `API_BASE_URL` (falling back to localhost) and an optional
    /// `COOKIE_SECURE` override.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if `API_BASE_URL` is not a
    /// parseable URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE.into());
        let base = Url::parse(&raw).map_err(|e| ConfigError::InvalidBaseUrl(e.to_string()))?;
        let mut config = Self::new(base);
        if let Some(secure) = env_bool("COOKIE_SECURE") {
            config.cookie_secure = secure;
        }
        Ok(config)
    }
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|raw| parse_bool(&raw))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
