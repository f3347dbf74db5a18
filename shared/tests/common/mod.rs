//! Common test utilities for pipeline integration tests.
//!
//! Provides an in-process mock collector that records every push and answers
//! with scripted status codes.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, StatusCode, Uri};
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use shared::config::PipelineConfig;
use shared::export::RetryPolicy;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A push received by the mock collector.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub tenant: Option<String>,
    pub body: Value,
}

impl ReceivedRequest {
    /// The `payload` of every record in the request, in order.
    pub fn payloads(&self) -> Vec<Value> {
        self.body["records"]
            .as_array()
            .map(|records| records.iter().map(|r| r["payload"].clone()).collect())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct CollectorState {
    requests: Mutex<Vec<ReceivedRequest>>,
    scripted: Mutex<VecDeque<StatusCode>>,
    fallback: Mutex<Option<StatusCode>>,
    delay: Mutex<Duration>,
}

/// Collector double listening on an ephemeral local port.
pub struct MockCollector {
    addr: SocketAddr,
    state: Arc<CollectorState>,
    server: JoinHandle<()>,
}

impl MockCollector {
    pub async fn start() -> Self {
        let state = Arc::new(CollectorState::default());
        let app = Router::new()
            .route("/v1/{signal}", post(collect))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answers the next requests with `statuses`, then falls back.
    pub fn respond_with(&self, statuses: impl IntoIterator<Item = StatusCode>) {
        self.state.scripted.lock().unwrap().extend(statuses);
    }

    /// Answers every unscripted request with `status`.
    pub fn always_respond(&self, status: StatusCode) {
        *self.state.fallback.lock().unwrap() = Some(status);
    }

    /// Holds every response for `delay` after recording the request.
    pub fn delay_responses(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }

    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    /// Every record payload received, across all requests.
    pub fn received_payloads(&self) -> Vec<Value> {
        self.requests()
            .iter()
            .flat_map(ReceivedRequest::payloads)
            .collect()
    }

    /// Waits until at least `count` requests arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.request_count() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("collector did not receive {count} request(s)"));
    }
}

impl Drop for MockCollector {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn collect(
    State(state): State<Arc<CollectorState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header_value = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    state.requests.lock().unwrap().push(ReceivedRequest {
        path: uri.path().to_string(),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        tenant: header_value(HeaderName::from_static("x-tenant")),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let scripted = state.scripted.lock().unwrap().pop_front();
    let fallback = *state.fallback.lock().unwrap();
    let delay = *state.delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    scripted.or(fallback).unwrap_or(StatusCode::OK)
}

/// Pipeline settings for tests: fast deterministic retries, no timer flushes.
pub fn test_config(collector: &MockCollector) -> PipelineConfig {
    let mut config = PipelineConfig::new(collector.url());
    config.retry = RetryPolicy::default()
        .with_initial_backoff(Duration::from_millis(10))
        .with_jitter(false);
    config.for_each_kind(|settings| settings.flush_interval_ms = 60_000);
    config
}
