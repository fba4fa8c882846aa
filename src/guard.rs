//! Edge route guard for the admin section.
//!
//! STRATEGY
//! ========
//! Delegate: the inbound cookie header is forwarded to the gateway's
//! `/users/me` and only an admin profile lets the request through. On a
//! 401/403 the guard makes exactly one `/auth/refresh` attempt, forwards
//! any rotated cookies onto the outbound response, and re-checks. Every
//! other outcome — network error, timeout, malformed body, non-admin —
//! redirects to the home route. The guard never verifies token claims
//! locally; the gateway's answer is authoritative.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use crate::state::AppState;

/// Lifetime of the access-token cookie minted after an edge refresh.
const ACCESS_COOKIE_MINUTES: i64 = 15;

#[derive(Debug, thiserror::Error)]
enum GuardError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("invalid gateway url: {0}")]
    Url(String),
}

/// Middleware for `/admin/*`. Fails closed: any error path redirects home.
pub async fn admin_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let cookie = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    match authorize(&state, &cookie).await {
        Ok(Authorization::Granted { rotated_cookies }) => {
            let mut response = next.run(request).await;
            for value in rotated_cookies {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            response
        }
        Ok(Authorization::Denied) => Redirect::temporary("/").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "admin session check failed, denying");
            Redirect::temporary("/").into_response()
        }
    }
}

enum Authorization {
    Granted { rotated_cookies: Vec<HeaderValue> },
    Denied,
}

enum MeCheck {
    Admin,
    NotAdmin,
    Unauthorized,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    #[serde(default)]
    is_admin: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

async fn authorize(state: &AppState, cookie: &str) -> Result<Authorization, GuardError> {
    match check_me(state, cookie).await? {
        MeCheck::Admin => return Ok(Authorization::Granted { rotated_cookies: Vec::new() }),
        // Valid session, wrong role: an authorization failure, not a
        // session expiry. No refresh attempt.
        MeCheck::NotAdmin => return Ok(Authorization::Denied),
        MeCheck::Unauthorized => {}
    }

    let Some(refreshed) = try_refresh(state, cookie).await? else {
        return Ok(Authorization::Denied);
    };

    let merged = merge_access_cookie(cookie, &refreshed.access_token);
    match check_me(state, &merged).await? {
        MeCheck::Admin => Ok(Authorization::Granted { rotated_cookies: refreshed.cookies }),
        _ => Ok(Authorization::Denied),
    }
}

/// Ask the gateway who the cookie belongs to.
async fn check_me(state: &AppState, cookie: &str) -> Result<MeCheck, GuardError> {
    let url = state
        .config
        .base
        .join("users/me")
        .map_err(|e| GuardError::Url(e.to_string()))?;
    let response = state
        .http
        .get(url)
        .header(header::COOKIE, cookie)
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Ok(MeCheck::Unauthorized);
    }
    if !status.is_success() {
        // Ambiguous gateway state; treat as not-admin and fail closed.
        return Ok(MeCheck::NotAdmin);
    }
    match response.json::<MeResponse>().await {
        Ok(me) if me.is_admin => Ok(MeCheck::Admin),
        Ok(_) | Err(_) => Ok(MeCheck::NotAdmin),
    }
}

struct Refreshed {
    access_token: String,
    /// Rotated cookies for the outbound response: anything the gateway set
    /// plus our own short-lived access-token cookie.
    cookies: Vec<HeaderValue>,
}

/// One-shot refresh using the caller's cookie. `None` means the session is
/// beyond recovery and the guard should deny.
async fn try_refresh(state: &AppState, cookie: &str) -> Result<Option<Refreshed>, GuardError> {
    let url = state
        .config
        .base
        .join("auth/refresh")
        .map_err(|e| GuardError::Url(e.to_string()))?;
    let response = state
        .http
        .post(url)
        .header(header::COOKIE, cookie)
        .json(&serde_json::json!({}))
        .send()
        .await?;

    if !response.status().is_success() {
        return Ok(None);
    }

    let mut cookies = Vec::new();
    for value in response.headers().get_all(reqwest::header::SET_COOKIE) {
        if let Ok(forwarded) = HeaderValue::from_bytes(value.as_bytes()) {
            cookies.push(forwarded);
        }
    }

    let Ok(body) = response.json::<RefreshResponse>().await else {
        return Ok(None);
    };

    let access_cookie = Cookie::build(("accessToken", body.access_token.clone()))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(ACCESS_COOKIE_MINUTES))
        .build();
    if let Ok(value) = HeaderValue::from_str(&access_cookie.to_string()) {
        cookies.push(value);
    }

    Ok(Some(Refreshed { access_token: body.access_token, cookies }))
}

/// Re-check `/users/me` with the freshly minted access token already in the
/// cookie header, the same way the browser would send it on the next hit.
fn merge_access_cookie(original: &str, access_token: &str) -> String {
    if original.is_empty() {
        format!("accessToken={access_token}")
    } else {
        format!("{original}; accessToken={access_token}")
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
