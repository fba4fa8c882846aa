//! User directory calls for the admin users view.

use crate::session::{ApiRequest, GatewayError, SessionManager, UserProfile};

/// `GET /users` — full directory listing.
///
/// # Errors
///
/// Network failures and non-2xx responses.
pub async fn list_users(session: &SessionManager) -> Result<Vec<UserProfile>, GatewayError> {
    session.send_json(ApiRequest::get("/users")).await
}

/// Admin users view model: the loaded directory plus the optimistic
/// promotion update. Role decisions elsewhere key off `/users/me`
/// (`current_user.is_admin`), never off token claims; this list is display
/// state only.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: Vec<UserProfile>,
}

impl UserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn users(&self) -> &[UserProfile] {
        &self.users
    }

    /// Replace the listing with a fresh fetch.
    ///
    /// # Errors
    ///
    /// Network failures and non-2xx responses; the previous listing is kept.
    pub async fn load(&mut self, session: &SessionManager) -> Result<(), GatewayError> {
        self.users = list_users(session).await?;
        Ok(())
    }

    /// Promote a user to admin. On success the matching row is updated
    /// locally rather than refetching the whole list.
    ///
    /// # Errors
    ///
    /// Network failures and non-2xx responses; no local update happens.
    pub async fn promote(
        &mut self,
        session: &SessionManager,
        email: &str,
    ) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "email": email });
        session.send_ok(ApiRequest::post("/users/promote", body)).await?;

        for user in &mut self.users {
            if user.email.eq_ignore_ascii_case(email) {
                user.is_admin = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
