//! Shared hub server state.

use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Injected into Axum handlers via the State extractor. The HTTP client has
/// no cookie jar: the guard forwards each caller's cookie header verbatim,
/// so ambient cookie state would leak sessions across requests.
#[derive(Clone)]
pub struct AppState {
    pub http: reqwest::Client,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// # Errors
    ///
    /// Returns the underlying builder error if the HTTP client cannot be
    /// constructed.
    pub fn new(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { http, config: Arc::new(config) })
    }
}
