//! Client-side session lifecycle.
//!
//! ARCHITECTURE
//! ============
//! The token store is the single source of truth for auth state and is only
//! ever written by the session manager. The auth API client performs the
//! three lifecycle calls (login, refresh, logout) on a raw client so a
//! failed refresh can never recursively trigger another refresh. Everything
//! else goes through `SessionManager::send`, which attaches the bearer
//! token and coordinates the single-flight refresh-and-retry on 401.

pub mod auth;
pub mod binding;
pub mod gateway;
pub mod manager;
pub mod store;

pub use auth::{AuthApi, AuthError};
pub use binding::AuthBinding;
pub use gateway::{ApiRequest, GatewayError};
pub use manager::{RefreshFailure, SessionError, SessionManager};
pub use store::{SessionSnapshot, TokenStore, UserProfile};
