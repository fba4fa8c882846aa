use super::*;

use std::net::SocketAddr;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use futures::future::join_all;
use tokio::time::timeout;
use uuid::Uuid;

const GOOD_PASSWORD: &str = "correct horse";

// =============================================================================
// STUB GATEWAY
// =============================================================================

struct Stub {
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    register_calls: AtomicUsize,
    me_calls: AtomicUsize,
    refresh_ok: AtomicBool,
    logout_ok: AtomicBool,
    /// Refresh hands out a token `/users/me` will reject (simulates a
    /// backend where the retried request still fails).
    refresh_issues_stale: AtomicBool,
    refresh_delay_ms: AtomicU64,
    valid_token: StdMutex<String>,
    issued: AtomicUsize,
    user_id: Uuid,
}

impl Stub {
    fn new() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            refresh_ok: AtomicBool::new(true),
            logout_ok: AtomicBool::new(true),
            refresh_issues_stale: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(0),
            valid_token: StdMutex::new(String::new()),
            issued: AtomicUsize::new(0),
            user_id: Uuid::new_v4(),
        }
    }

    fn next_token(&self) -> String {
        format!("t{}", self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn set_valid(&self, token: &str) {
        *self.valid_token.lock().expect("stub mutex") = token.to_owned();
    }

    fn expire_session(&self) {
        self.set_valid("expired-out-of-band");
    }
}

async fn stub_login(State(stub): State<Arc<Stub>>, Json(body): Json<serde_json::Value>) -> axum::response::Response {
    stub.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["password"] == GOOD_PASSWORD {
        let token = stub.next_token();
        stub.set_valid(&token);
        Json(serde_json::json!({ "accessToken": token })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "invalid credentials").into_response()
    }
}

async fn stub_refresh(State(stub): State<Arc<Stub>>) -> axum::response::Response {
    stub.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = stub.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if !stub.refresh_ok.load(Ordering::SeqCst) {
        return (StatusCode::UNAUTHORIZED, "no session").into_response();
    }
    let token = stub.next_token();
    if stub.refresh_issues_stale.load(Ordering::SeqCst) {
        let other = stub.next_token();
        stub.set_valid(&other);
    } else {
        stub.set_valid(&token);
    }
    Json(serde_json::json!({ "accessToken": token })).into_response()
}

async fn stub_logout(State(stub): State<Arc<Stub>>) -> StatusCode {
    stub.logout_calls.fetch_add(1, Ordering::SeqCst);
    if stub.logout_ok.load(Ordering::SeqCst) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn stub_me(State(stub): State<Arc<Stub>>, headers: HeaderMap) -> axum::response::Response {
    stub.me_calls.fetch_add(1, Ordering::SeqCst);
    let expected = format!("Bearer {}", stub.valid_token.lock().expect("stub mutex"));
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented == expected {
        Json(serde_json::json!({
            "id": stub.user_id,
            "email": "ada@example.com",
            "name": "Ada",
            "isAdmin": false,
        }))
        .into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "invalid token").into_response()
    }
}

async fn stub_register(State(stub): State<Arc<Stub>>) -> StatusCode {
    stub.register_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::CREATED
}

async fn spawn_gateway() -> (SessionManager, Arc<Stub>) {
    let stub = Arc::new(Stub::new());
    let app = Router::new()
        .route("/auth/login", post(stub_login))
        .route("/auth/refresh", post(stub_refresh))
        .route("/auth/logout", post(stub_logout))
        .route("/users/me", get(stub_me))
        .route("/users/register", post(stub_register))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr: SocketAddr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub serve");
    });

    let config = GatewayConfig::new(Url::parse(&format!("http://{addr}/")).expect("stub url"));
    let manager = SessionManager::new(&config).expect("manager");
    (manager, stub)
}

async fn assert_no_further_broadcast(binding: &mut AuthBinding) {
    assert!(
        timeout(Duration::from_millis(80), binding.changed()).await.is_err(),
        "expected no further store broadcast"
    );
}

// =============================================================================
// Hydration
// =============================================================================

#[tokio::test]
async fn hydration_with_valid_session_authenticates() {
    let (manager, stub) = spawn_gateway().await;
    manager.start().await;

    let snapshot = manager.snapshot();
    assert!(!snapshot.initializing);
    assert!(snapshot.is_authenticated());
    assert_eq!(snapshot.current_user.unwrap().email, "ada@example.com");
    assert_eq!(stub.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hydration_failure_settles_anonymous_in_one_broadcast() {
    let (manager, stub) = spawn_gateway().await;
    stub.refresh_ok.store(false, Ordering::SeqCst);
    let mut binding = manager.subscribe();

    manager.start().await;

    binding.changed().await.expect("hydration broadcast");
    let snapshot = binding.snapshot();
    assert!(!snapshot.initializing);
    assert!(!snapshot.is_authenticated());
    assert_no_further_broadcast(&mut binding).await;
}

#[tokio::test]
async fn hydration_runs_at_most_once() {
    let (manager, stub) = spawn_gateway().await;
    manager.start().await;
    manager.start().await;
    assert_eq!(stub.refresh_calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Sign-in / sign-out
// =============================================================================

#[tokio::test]
async fn sign_in_with_valid_credentials_sets_user() {
    let (manager, stub) = spawn_gateway().await;
    manager
        .sign_in("ada@example.com", GOOD_PASSWORD)
        .await
        .expect("sign in");

    let snapshot = manager.snapshot();
    assert!(snapshot.is_authenticated());
    assert_eq!(snapshot.current_user.unwrap().email, "ada@example.com");
    assert_eq!(snapshot.access_token.as_deref(), Some("t1"));
    assert_eq!(stub.login_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sign_in_with_wrong_password_leaves_state_unchanged() {
    let (manager, stub) = spawn_gateway().await;
    let err = manager
        .sign_in("ada@example.com", "wrong")
        .await
        .expect_err("must fail");

    assert!(matches!(err, SessionError::Auth(AuthError::Status { status: 401, .. })));
    let snapshot = manager.snapshot();
    assert!(!snapshot.is_authenticated());
    assert!(snapshot.access_token.is_none());
    assert_eq!(stub.me_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sign_out_clears_state_and_calls_gateway() {
    let (manager, stub) = spawn_gateway().await;
    manager
        .sign_in("ada@example.com", GOOD_PASSWORD)
        .await
        .expect("sign in");

    manager.sign_out().await.expect("sign out");
    assert!(!manager.snapshot().is_authenticated());
    assert_eq!(stub.logout_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sign_out_clears_state_even_when_logout_fails() {
    let (manager, stub) = spawn_gateway().await;
    manager
        .sign_in("ada@example.com", GOOD_PASSWORD)
        .await
        .expect("sign in");
    stub.logout_ok.store(false, Ordering::SeqCst);

    let result = manager.sign_out().await;
    assert!(result.is_err());
    let snapshot = manager.snapshot();
    assert!(!snapshot.is_authenticated());
    assert!(snapshot.access_token.is_none());
}

// =============================================================================
// Single-flight refresh on 401
// =============================================================================

#[tokio::test]
async fn concurrent_401s_collapse_to_a_single_refresh() {
    let (manager, stub) = spawn_gateway().await;
    manager
        .sign_in("ada@example.com", GOOD_PASSWORD)
        .await
        .expect("sign in");
    let me_calls_after_sign_in = stub.me_calls.load(Ordering::SeqCst);

    stub.expire_session();
    stub.refresh_delay_ms.store(100, Ordering::SeqCst);

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.fetch_me().await })
        })
        .collect();
    let results = timeout(Duration::from_secs(5), join_all(tasks))
        .await
        .expect("tasks timed out");

    for result in results {
        let profile = result.expect("task join").expect("retried fetch");
        assert_eq!(profile.email, "ada@example.com");
    }
    assert_eq!(stub.refresh_calls.load(Ordering::SeqCst), 1);
    // Each of the five requests hit /users/me twice: the 401 and the retry.
    assert_eq!(stub.me_calls.load(Ordering::SeqCst), me_calls_after_sign_in + 10);
}

#[tokio::test]
async fn refresh_success_swaps_token_and_keeps_user() {
    let (manager, stub) = spawn_gateway().await;
    manager
        .sign_in("ada@example.com", GOOD_PASSWORD)
        .await
        .expect("sign in");
    stub.expire_session();

    manager.fetch_me().await.expect("retried fetch");

    let snapshot = manager.snapshot();
    assert!(snapshot.is_authenticated());
    assert_ne!(snapshot.access_token.as_deref(), Some("t1"));
}

#[tokio::test]
async fn refresh_failure_fans_out_and_signs_out_once() {
    let (manager, stub) = spawn_gateway().await;
    manager
        .sign_in("ada@example.com", GOOD_PASSWORD)
        .await
        .expect("sign in");
    let mut binding = manager.subscribe();

    stub.expire_session();
    stub.refresh_ok.store(false, Ordering::SeqCst);
    stub.refresh_delay_ms.store(100, Ordering::SeqCst);

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.fetch_me().await })
        })
        .collect();
    let results = timeout(Duration::from_secs(5), join_all(tasks))
        .await
        .expect("tasks timed out");

    for result in results {
        let err = result.expect("task join").expect_err("must fail");
        assert!(matches!(err, GatewayError::Status { status: 401, .. }));
    }
    assert_eq!(stub.refresh_calls.load(Ordering::SeqCst), 1);

    binding.changed().await.expect("sign-out broadcast");
    assert!(!binding.is_authenticated());
    assert_no_further_broadcast(&mut binding).await;
}

#[tokio::test]
async fn request_is_retried_at_most_once() {
    let (manager, stub) = spawn_gateway().await;
    stub.refresh_issues_stale.store(true, Ordering::SeqCst);
    stub.expire_session();

    let err = manager.fetch_me().await.expect_err("must fail");
    assert!(matches!(err, GatewayError::Status { status: 401, .. }));
    assert_eq!(stub.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(stub.me_calls.load(Ordering::SeqCst), 2);
    assert!(!manager.snapshot().is_authenticated());
}

#[tokio::test]
async fn auth_endpoints_never_trigger_refresh() {
    let (manager, stub) = spawn_gateway().await;
    let body = serde_json::json!({ "email": "ada@example.com", "password": "wrong" });
    let response = manager
        .send(ApiRequest::post("/auth/login", body))
        .await
        .expect("send");

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert_eq!(stub.refresh_calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn register_user_posts_to_registration_endpoint() {
    let (manager, stub) = spawn_gateway().await;
    manager
        .register_user("new@example.com", "pw", "New User")
        .await
        .expect("register");
    assert_eq!(stub.register_calls.load(Ordering::SeqCst), 1);
}
