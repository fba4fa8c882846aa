//! Log viewer query surface.
//!
//! DESIGN
//! ======
//! `LogQuery` is plain view state: it encodes to the gateway's query-string
//! contract and round-trips through an opaque base64 cookie blob so the
//! admin page can restore its last filter. `LogsView` owns fetch
//! coordination: a newer fetch aborts the previous task, and a generation
//! check before publishing guarantees a stale response can never overwrite
//! a fresher one even if the abort races.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::session::{ApiRequest, GatewayError, SessionManager};

/// One row from `GET /logs`. Fields mirror the gateway wholesale; metadata
/// stays as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub source: String,
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Filter state for the log viewer. The auto-refresh fields are view
/// behavior and never hit the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogQuery {
    pub sources: Vec<String>,
    pub levels: Vec<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub message_contains: Option<String>,
    pub metadata_key: Option<String>,
    pub metadata_value: Option<String>,
    pub skip: u32,
    pub limit: u32,
    pub auto_refresh: bool,
    pub refresh_interval_secs: u64,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            levels: Vec::new(),
            from: None,
            to: None,
            message_contains: None,
            metadata_key: None,
            metadata_value: None,
            skip: 0,
            limit: 100,
            auto_refresh: false,
            refresh_interval_secs: 30,
        }
    }
}

impl LogQuery {
    /// Wire encoding: repeated `sources`, repeated `level`, then the scalar
    /// filters; `skip` and `limit` are always sent.
    #[must_use]
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        for source in &self.sources {
            query.push(("sources".into(), source.clone()));
        }
        for level in &self.levels {
            query.push(("level".into(), level.clone()));
        }
        if let Some(from) = &self.from {
            query.push(("from".into(), from.clone()));
        }
        if let Some(to) = &self.to {
            query.push(("to".into(), to.clone()));
        }
        if let Some(text) = &self.message_contains {
            query.push(("messageContains".into(), text.clone()));
        }
        if let Some(key) = &self.metadata_key {
            query.push(("metadataKey".into(), key.clone()));
        }
        if let Some(value) = &self.metadata_value {
            query.push(("metadataValue".into(), value.clone()));
        }
        query.push(("skip".into(), self.skip.to_string()));
        query.push(("limit".into(), self.limit.to_string()));
        query
    }

    /// Opaque blob for cookie persistence of the filter form.
    ///
    /// # Errors
    ///
    /// Serialization failures (not expected for this shape).
    pub fn to_cookie_blob(&self) -> Result<String, serde_json::Error> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(self)?))
    }

    /// Decode a persisted blob. Garbage decodes to `None` and the caller
    /// falls back to defaults; a stale cookie must never break the page.
    #[must_use]
    pub fn from_cookie_blob(blob: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(blob).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// `GET /logs` with the given filter.
///
/// # Errors
///
/// Network failures and non-2xx responses.
pub async fn fetch_logs(
    session: &SessionManager,
    query: &LogQuery,
) -> Result<Vec<LogEntry>, GatewayError> {
    session
        .send_json(ApiRequest::get("/logs").with_query(query.to_query()))
        .await
}

/// Fetch coordinator for the log viewer. Results are published on a watch
/// channel; only the newest outstanding fetch may publish.
pub struct LogsView {
    session: SessionManager,
    results: watch::Sender<Vec<LogEntry>>,
    generation: Arc<AtomicU64>,
    current: Option<JoinHandle<()>>,
    auto: Option<JoinHandle<()>>,
}

impl LogsView {
    #[must_use]
    pub fn new(session: SessionManager) -> Self {
        let (results, _rx) = watch::channel(Vec::new());
        Self { session, results, generation: Arc::new(AtomicU64::new(0)), current: None, auto: None }
    }

    #[must_use]
    pub fn results(&self) -> watch::Receiver<Vec<LogEntry>> {
        self.results.subscribe()
    }

    /// Issue a fetch for the given filter, superseding any outstanding one.
    /// The previous task is aborted and its result discarded even if it had
    /// already completed the network call.
    pub fn fetch(&mut self, query: LogQuery) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.current.take() {
            previous.abort();
        }

        let session = self.session.clone();
        let results = self.results.clone();
        let latest = Arc::clone(&self.generation);
        self.current = Some(tokio::spawn(async move {
            publish_fetch(&session, &results, &latest, generation, &query).await;
        }));
    }

    /// Toggle periodic refetching of the given filter. A manual `fetch`
    /// bumps the generation and silences in-flight auto rounds; the next
    /// tick picks the counter back up.
    pub fn set_auto_refresh(&mut self, query: Option<LogQuery>) {
        if let Some(previous) = self.auto.take() {
            previous.abort();
        }
        let Some(query) = query else { return };

        let session = self.session.clone();
        let results = self.results.clone();
        let latest = Arc::clone(&self.generation);
        let every = Duration::from_secs(query.refresh_interval_secs.max(1));
        self.auto = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let generation = latest.load(Ordering::SeqCst);
                publish_fetch(&session, &results, &latest, generation, &query).await;
            }
        }));
    }
}

async fn publish_fetch(
    session: &SessionManager,
    results: &watch::Sender<Vec<LogEntry>>,
    latest: &AtomicU64,
    generation: u64,
    query: &LogQuery,
) {
    match fetch_logs(session, query).await {
        Ok(entries) => {
            if latest.load(Ordering::SeqCst) == generation {
                results.send_replace(entries);
            }
        }
        Err(e) => {
            if latest.load(Ordering::SeqCst) == generation {
                tracing::warn!(error = %e, "log fetch failed");
            }
        }
    }
}

impl Drop for LogsView {
    fn drop(&mut self) {
        if let Some(task) = self.current.take() {
            task.abort();
        }
        if let Some(task) = self.auto.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "logs_test.rs"]
mod tests;
