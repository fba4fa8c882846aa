//! Token store — single source of truth for auth state.
//!
//! DESIGN
//! ======
//! State lives behind a `tokio::sync::watch` channel. Reads are synchronous
//! snapshots; every mutation broadcasts to all subscribers with no diffing.
//! Only the session manager mutates the store (the mutators are
//! `pub(crate)`); everything else reads snapshots through an `AuthBinding`.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use super::binding::AuthBinding;

/// Profile snapshot fetched from `/users/me`. Transferred wholesale; never
/// partially merged (the admin promotion view applies its own optimistic
/// update to a separate list, not to this snapshot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
}

/// Current session state. The access token is held only in memory; the
/// durable credential is the HttpOnly refresh cookie carried by the HTTP
/// client's cookie jar.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    pub current_user: Option<UserProfile>,
    /// True until the first hydration attempt settles, success or failure.
    pub initializing: bool,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self { access_token: None, current_user: None, initializing: true }
    }
}

pub struct TokenStore {
    tx: watch::Sender<SessionSnapshot>,
}

impl TokenStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self { tx }
    }

    /// Non-blocking read of the latest state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    /// Subscribe to state changes. Wake-ups are coalesced: a subscriber that
    /// has not polled between two mutations observes the latest state once.
    #[must_use]
    pub fn subscribe(&self) -> AuthBinding {
        AuthBinding::new(self.tx.subscribe())
    }

    /// Settle hydration in a single broadcast so subscribers never observe
    /// an intermediate anonymous flash before the first refresh resolves.
    pub(crate) fn finish_hydration(&self, outcome: Option<(String, UserProfile)>) {
        self.tx.send_modify(|state| {
            match outcome {
                Some((token, user)) => {
                    state.access_token = Some(token);
                    state.current_user = Some(user);
                }
                None => {
                    state.access_token = None;
                    state.current_user = None;
                }
            }
            state.initializing = false;
        });
    }

    pub(crate) fn set_session(&self, token: String, user: UserProfile) {
        self.tx.send_modify(|state| {
            state.access_token = Some(token);
            state.current_user = Some(user);
            state.initializing = false;
        });
    }

    /// Swap in a refreshed access token. The user snapshot is retained; a
    /// later failed call will clear both together.
    pub(crate) fn set_access_token(&self, token: String) {
        self.tx.send_modify(|state| {
            state.access_token = Some(token);
        });
    }

    /// Drop to anonymous. Used by sign-out and unrecoverable refresh failure.
    pub(crate) fn clear(&self) {
        self.tx.send_modify(|state| {
            state.access_token = None;
            state.current_user = None;
            state.initializing = false;
        });
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
