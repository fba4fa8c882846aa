//! Gateway request wrapper types.
//!
//! The retried marker lives on an explicit request value rather than being
//! stamped onto shared client config, so a request retried from two code
//! paths can never alias another request's retry state.

use reqwest::Method;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid request url: {0}")]
    Url(String),
}

/// One gateway call plus its retry marker. Built once per logical request;
/// `into_retried` consumes the original so a request can be resubmitted at
/// most once.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub retried: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        let mut request = Self::new(Method::POST, path);
        request.body = Some(body);
        request
    }

    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None, retried: false }
    }

    #[must_use]
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub(crate) fn into_retried(mut self) -> Self {
        self.retried = true;
        self
    }
}

/// Auth lifecycle endpoints bypass both the bearer header and the
/// refresh-on-401 path; their credential is the cookie, and retrying them
/// through the refresh path would recurse.
#[must_use]
pub fn is_auth_path(path: &str) -> bool {
    path.contains("/auth/refresh") || path.contains("/auth/login") || path.contains("/auth/logout")
}

/// Decode a 2xx JSON body, mapping every other status to `Status`.
pub(crate) async fn expect_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::Network(e.to_string()))?;
    if !status.is_success() {
        return Err(GatewayError::Status { status: status.as_u16(), body });
    }
    serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;
