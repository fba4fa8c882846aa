//! Developer-hub session core and admin edge guard.
//!
//! ARCHITECTURE
//! ============
//! All durable state (users, logs, sessions) lives behind a remote API
//! gateway; this crate is the client-side glue. The session layer owns the
//! token lifecycle: silent refresh on startup, single-flight refresh on 401
//! with a one-shot retry, and a watch-channel snapshot of auth state for
//! consumers. The `guard` module is the server-side counterpart: an Axum
//! middleware that gates `/admin/*` by delegating the session check to the
//! gateway's `/users/me` endpoint.

pub mod api;
pub mod config;
pub mod guard;
pub mod routes;
pub mod session;
pub mod state;
