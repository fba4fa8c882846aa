//! Session manager — hydration, sign-in/out, single-flight refresh.
//!
//! ARCHITECTURE
//! ============
//! One explicitly constructed instance owned by the composition root. The
//! manager is the only writer to the token store. All gateway traffic flows
//! through `send`, which attaches the bearer token and, on a 401, awaits
//! the shared refresh future and resubmits the original request exactly
//! once. N concurrent 401s collapse to one network refresh: the pending
//! future is stored in a slot and handed to every caller; settlement clears
//! the slot before any caller resolves.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use super::auth::{AuthApi, AuthError};
use super::binding::AuthBinding;
use super::gateway::{ApiRequest, GatewayError, expect_json, is_auth_path};
use super::store::{SessionSnapshot, TokenStore, UserProfile};
use crate::config::GatewayConfig;

/// Outcome of a shared refresh, cloned to every waiting caller.
#[derive(Debug, Clone, thiserror::Error)]
#[error("token refresh failed: {0}")]
pub struct RefreshFailure(String);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("http client build failed: {0}")]
    ClientBuild(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshFailure>>>;

struct Inner {
    http: reqwest::Client,
    auth: AuthApi,
    base: Url,
    store: TokenStore,
    /// Pending refresh, if one is in flight. Guarded by an async mutex so
    /// check-and-insert is atomic across tasks.
    refresh_slot: Mutex<Option<SharedRefresh>>,
    hydrated: AtomicBool,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Build a manager against the given gateway. Construction has no side
    /// effects; call [`start`](Self::start) to run hydration.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ClientBuild` if the HTTP client cannot be
    /// constructed.
    pub fn new(config: &GatewayConfig) -> Result<Self, SessionError> {
        // One client, one cookie jar: the HttpOnly refresh cookie set by
        // login/refresh is shared by every call, exactly like a browser.
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| SessionError::ClientBuild(e.to_string()))?;
        let auth = AuthApi::new(http.clone(), config.base.clone());
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                auth,
                base: config.base.clone(),
                store: TokenStore::new(),
                refresh_slot: Mutex::new(None),
                hydrated: AtomicBool::new(false),
            }),
        })
    }

    /// Startup hydration: silent refresh, then profile fetch. Runs at most
    /// once per manager; failures resolve to anonymous without surfacing an
    /// error — a visitor with no valid cookie gets a working logged-out
    /// state, never an error screen. The store settles in one broadcast.
    pub async fn start(&self) {
        if self.inner.hydrated.swap(true, Ordering::SeqCst) {
            return;
        }
        let outcome = match self.inner.auth.refresh().await {
            Ok(token) => match self.fetch_profile(&token).await {
                Ok(user) => Some((token, user)),
                Err(e) => {
                    tracing::debug!(error = %e, "profile fetch during hydration failed");
                    None
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "silent refresh failed, starting anonymous");
                None
            }
        };
        self.inner.store.finish_hydration(outcome);
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.store.snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> AuthBinding {
        self.inner.store.subscribe()
    }

    /// Sign in with credentials. On success the store transitions to
    /// authenticated in a single broadcast; on any failure the store is
    /// left untouched and the error propagates for the form to render.
    ///
    /// # Errors
    ///
    /// Login rejections (bad credentials) and network failures.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let token = self.inner.auth.login(email, password).await?;
        let user = self.fetch_profile(&token).await?;
        self.inner.store.set_session(token, user);
        Ok(())
    }

    /// Sign out. The server-side logout is best-effort: local state is
    /// always cleared, and a network failure is still reported.
    ///
    /// # Errors
    ///
    /// Network failures and non-2xx logout responses, after the local
    /// session has already been cleared.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let result = self.inner.auth.logout().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "logout call failed, clearing local session anyway");
        }
        self.inner.store.clear();
        result.map_err(Into::into)
    }

    /// Register a new account. Does not sign the user in; callers compose
    /// register-then-sign-in if they want that flow.
    ///
    /// # Errors
    ///
    /// Network failures and non-2xx registration responses.
    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "email": email, "password": password, "name": name });
        self.send_ok(ApiRequest::post("/users/register", body)).await
    }

    /// Refetch `/users/me` through the gateway (with refresh-on-401).
    ///
    /// # Errors
    ///
    /// Network failures and non-2xx responses.
    pub async fn fetch_me(&self) -> Result<UserProfile, GatewayError> {
        self.send_json(ApiRequest::get("/users/me")).await
    }

    /// Await the in-flight refresh, or start one. Exactly one network call
    /// is made no matter how many tasks arrive here concurrently; a failed
    /// refresh clears the store to anonymous exactly once, inside the
    /// shared future.
    ///
    /// # Errors
    ///
    /// The shared failure, cloned to every waiter.
    pub async fn refresh(&self) -> Result<String, RefreshFailure> {
        let pending = self.refresh_shared().await;
        pending.await
    }

    async fn refresh_shared(&self) -> SharedRefresh {
        let mut slot = self.inner.refresh_slot.lock().await;
        if let Some(pending) = slot.as_ref() {
            return pending.clone();
        }

        let inner = Arc::clone(&self.inner);
        let pending = async move {
            let outcome = inner.auth.refresh().await;
            // Clear the slot before resolving so a refresh triggered after
            // settlement starts a fresh call instead of observing this one.
            *inner.refresh_slot.lock().await = None;
            match outcome {
                Ok(token) => {
                    inner.store.set_access_token(token.clone());
                    Ok(token)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "token refresh failed, ending session");
                    inner.store.clear();
                    Err(RefreshFailure(e.to_string()))
                }
            }
        }
        .boxed()
        .shared();

        *slot = Some(pending.clone());
        pending
    }

    /// Send a gateway request. A 401 on a first attempt (off the auth
    /// endpoints) awaits the shared refresh and resubmits once with the new
    /// token; if the refresh fails the original 401 response is returned
    /// and the session has already been torn down. Every other status
    /// passes through unmodified.
    ///
    /// # Errors
    ///
    /// Transport-level failures only; HTTP error statuses are returned in
    /// the response for typed helpers to interpret.
    pub async fn send(&self, request: ApiRequest) -> Result<reqwest::Response, GatewayError> {
        let response = self.dispatch(&request).await?;
        if response.status() != reqwest::StatusCode::UNAUTHORIZED
            || request.retried
            || is_auth_path(&request.path)
        {
            return Ok(response);
        }

        let request = request.into_retried();
        if self.refresh().await.is_err() {
            return Ok(response);
        }
        let retried = self.dispatch(&request).await?;
        if retried.status() == reqwest::StatusCode::UNAUTHORIZED {
            // Refresh succeeded but the gateway still rejects us; recovery
            // is not possible from here.
            tracing::warn!(path = %request.path, "still unauthorized after refresh, ending session");
            self.inner.store.clear();
        }
        Ok(retried)
    }

    /// `send` plus 2xx JSON decoding.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, and body decode failures.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, GatewayError> {
        let response = self.send(request).await?;
        expect_json(response).await
    }

    /// `send` for endpoints whose body is irrelevant; 2xx or error.
    ///
    /// # Errors
    ///
    /// Transport failures and non-2xx statuses.
    pub async fn send_ok(&self, request: ApiRequest) -> Result<(), GatewayError> {
        let response = self.send(request).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(GatewayError::Status { status: status.as_u16(), body })
        }
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<reqwest::Response, GatewayError> {
        let url = self
            .inner
            .base
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| GatewayError::Url(e.to_string()))?;

        let mut builder = self.inner.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !is_auth_path(&request.path) {
            if let Some(token) = self.inner.store.snapshot().access_token {
                builder = builder.bearer_auth(token);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))
    }

    /// Profile fetch with an explicit token, used before the token is
    /// committed to the store (sign-in, hydration) so a failed fetch leaves
    /// state untouched.
    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, GatewayError> {
        let url = self
            .inner
            .base
            .join("users/me")
            .map_err(|e| GatewayError::Url(e.to_string()))?;
        let response = self
            .inner
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        expect_json(response).await
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
