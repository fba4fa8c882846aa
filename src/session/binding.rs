//! Read-only view of the token store for UI consumers.

use tokio::sync::watch;

use super::store::{SessionSnapshot, UserProfile};

/// Subscription handle over the token store. Consumers gate rendering on
/// `is_initializing` so an anonymous flash is never shown before the first
/// hydration settles.
pub struct AuthBinding {
    rx: watch::Receiver<SessionSnapshot>,
}

impl AuthBinding {
    pub(crate) fn new(rx: watch::Receiver<SessionSnapshot>) -> Self {
        Self { rx }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.rx.borrow().clone()
    }

    /// Derived flag: a user snapshot is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().current_user.is_some()
    }

    #[must_use]
    pub fn is_initializing(&self) -> bool {
        self.rx.borrow().initializing
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.rx.borrow().current_user.clone()
    }

    /// Wait for the next store mutation. Multiple mutations between polls
    /// coalesce into a single wake-up with the latest state.
    ///
    /// # Errors
    ///
    /// Returns an error if the owning session manager has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }
}

#[cfg(test)]
#[path = "binding_test.rs"]
mod tests;
