//! Auth API client — login, refresh, logout.
//!
//! These three calls ride on the raw HTTP client and deliberately skip the
//! gateway's 401-retry path: a failed login or refresh must never trigger
//! another refresh. Credentials travel as the HttpOnly refresh cookie in
//! the shared cookie jar; no bearer header is attached.

use reqwest::Url;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Network(String),
    /// Non-2xx from the gateway, surfaced unchanged. No interpretation of
    /// status codes happens at this layer.
    #[error("auth endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid auth response: {0}")]
    Decode(String),
    #[error("invalid auth url: {0}")]
    Url(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
}

pub struct AuthApi {
    http: reqwest::Client,
    base: Url,
}

impl AuthApi {
    #[must_use]
    pub fn new(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }

    /// `POST /auth/login` — returns the access token; the gateway also sets
    /// the HttpOnly refresh cookie on the jar.
    ///
    /// # Errors
    ///
    /// Network failures and non-2xx responses are surfaced to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let body = serde_json::json!({ "email": email, "password": password });
        self.token_call("auth/login", &body).await
    }

    /// `POST /auth/refresh` — mints a new access token from the refresh
    /// cookie. May rotate the cookie; the jar picks that up automatically.
    ///
    /// # Errors
    ///
    /// Network failures and non-2xx responses are surfaced to the caller.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        self.token_call("auth/refresh", &serde_json::json!({})).await
    }

    /// `POST /auth/logout` — best-effort server-side session teardown.
    ///
    /// # Errors
    ///
    /// Network failures and non-2xx responses are surfaced to the caller.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let url = self.endpoint("auth/logout")?;
        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::Status { status: status.as_u16(), body })
        }
    }

    async fn token_call(&self, path: &str, body: &serde_json::Value) -> Result<String, AuthError> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(AuthError::Status { status: status.as_u16(), body: text });
        }

        let token: TokenResponse =
            serde_json::from_str(&text).map_err(|e| AuthError::Decode(e.to_string()))?;
        Ok(token.access_token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base.join(path).map_err(|e| AuthError::Url(e.to_string()))
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
