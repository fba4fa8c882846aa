//! Router assembly for the hub server.
//!
//! The admin section sits behind the delegate guard middleware; everything
//! else is public. Page bodies are minimal shells — the hub's data all
//! comes from the gateway through the session client.

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{Html, Redirect};
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::guard::admin_guard;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let admin = Router::new()
        .route("/admin", get(admin_index))
        .route("/admin/logs", get(admin_logs))
        .route("/admin/users", get(admin_users))
        .layer(middleware::from_fn_with_state(state.clone(), admin_guard));

    Router::new()
        .route("/", get(home))
        .route("/healthz", get(healthz))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> Html<&'static str> {
    Html("<!doctype html><title>devhub</title><h1>devhub</h1><p>Personal developer hub.</p>")
}

async fn admin_index() -> Redirect {
    Redirect::temporary("/admin/logs")
}

async fn admin_logs() -> Html<&'static str> {
    Html("<!doctype html><title>Logs</title><h1>Service logs</h1>")
}

async fn admin_users() -> Html<&'static str> {
    Html("<!doctype html><title>Users</title><h1>User directory</h1>")
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
