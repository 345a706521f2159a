//! Scripted in-process executor for client tests.
//!
//! Each route answers from a script: the status route pops replies in order
//! and keeps repeating the last one once the queue runs dry.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use labexec_common::config::ExecutorConfig;
use labexec_common::endpoints;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub enum Reply {
    Json(StatusCode, Value),
    Raw(StatusCode, &'static str),
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply::Json(StatusCode::OK, body)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Json(status, body) => (status, Json(body)).into_response(),
            Reply::Raw(status, body) => (
                status,
                [(header::CONTENT_TYPE, "application/json")],
                Body::from(body),
            )
                .into_response(),
        }
    }
}

pub fn queued() -> Reply {
    Reply::ok(json!({"status": "queued"}))
}

pub fn running() -> Reply {
    Reply::ok(json!({"status": "running"}))
}

pub fn completed(result: Value) -> Reply {
    Reply::ok(json!({"status": "completed", "result": result}))
}

pub fn job_error(message: &str) -> Reply {
    Reply::ok(json!({"status": "error", "error": message}))
}

/// Result body for a python run where every test echoes `stdout`
pub fn python_result(results: Vec<Value>) -> Value {
    let total: u64 = results
        .iter()
        .filter_map(|r| r.get("duration_ms").and_then(Value::as_u64))
        .sum();
    json!({
        "compiled": true,
        "language": "python",
        "status": "success",
        "message": null,
        "results": results,
        "total_duration_ms": total,
    })
}

pub fn test_result(id: u32, stdout: &str, passed: bool, duration_ms: u64) -> Value {
    json!({
        "id": id,
        "ok": true,
        "passed": passed,
        "input": "",
        "expected": null,
        "stdout": stdout,
        "stderr": "",
        "timed_out": false,
        "duration_ms": duration_ms,
        "memory_kb": 1024,
        "exit_code": 0,
        "term_signal": null,
    })
}

pub struct Script {
    health: Reply,
    languages: Reply,
    submit: Reply,
    statuses: VecDeque<Reply>,
    status_delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            health: Reply::ok(json!({"status": "ok"})),
            languages: Reply::ok(json!([
                {"language": "python", "display_name": "Python 3"},
                {"language": "cpp", "display_name": "C++17"},
            ])),
            submit: Reply::ok(json!({"id": 1})),
            statuses: VecDeque::from([completed(python_result(Vec::new()))]),
            status_delay: Duration::ZERO,
        }
    }
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health(mut self, reply: Reply) -> Self {
        self.health = reply;
        self
    }

    pub fn languages(mut self, reply: Reply) -> Self {
        self.languages = reply;
        self
    }

    pub fn submit(mut self, reply: Reply) -> Self {
        self.submit = reply;
        self
    }

    pub fn statuses(mut self, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.statuses = replies.into_iter().collect();
        self
    }

    /// Hold every status reply this long before answering
    pub fn status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }
}

struct Shared {
    script: Mutex<Script>,
    status_hits: AtomicUsize,
    submissions: Mutex<Vec<Value>>,
    polled_ids: Mutex<Vec<String>>,
}

pub struct FakeExecutor {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl FakeExecutor {
    pub async fn start(script: Script) -> Self {
        let shared = Arc::new(Shared {
            script: Mutex::new(script),
            status_hits: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            polled_ids: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route(endpoints::HEALTH, get(health))
            .route(endpoints::LANGUAGES, get(languages))
            .route(endpoints::EXECUTE, post(execute))
            .route(endpoints::STATUS_ROUTE, get(status))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            shared,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> ExecutorConfig {
        ExecutorConfig::new(self.url())
    }

    pub fn status_hits(&self) -> usize {
        self.shared.status_hits.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.shared.submissions.lock().unwrap().clone()
    }

    pub fn polled_ids(&self) -> Vec<String> {
        self.shared.polled_ids.lock().unwrap().clone()
    }
}

impl Drop for FakeExecutor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Base URL of a port nothing listens on
pub fn unused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn health(State(shared): State<Arc<Shared>>) -> Reply {
    shared.script.lock().unwrap().health.clone()
}

async fn languages(State(shared): State<Arc<Shared>>) -> Reply {
    shared.script.lock().unwrap().languages.clone()
}

async fn execute(State(shared): State<Arc<Shared>>, Json(body): Json<Value>) -> Reply {
    shared.submissions.lock().unwrap().push(body);
    shared.script.lock().unwrap().submit.clone()
}

async fn status(State(shared): State<Arc<Shared>>, Path(id): Path<String>) -> Reply {
    shared.status_hits.fetch_add(1, Ordering::SeqCst);
    shared.polled_ids.lock().unwrap().push(id);

    let (reply, delay) = {
        let mut script = shared.script.lock().unwrap();
        let reply = if script.statuses.len() > 1 {
            script.statuses.pop_front()
        } else {
            script.statuses.front().cloned()
        };
        (reply, script.status_delay)
    };

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    reply.unwrap_or_else(|| {
        Reply::Json(StatusCode::NOT_FOUND, json!({"error": "Job not found"}))
    })
}
