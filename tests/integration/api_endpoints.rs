//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - The audit log endpoints return what the executor recorded
//! - `/metrics` exposes the per-check counters
//! - Error handling is correct

use std::net::SocketAddr;
use std::sync::Arc;

use algowatch::{
    ActionOutput, Output,
    api::{ApiConfig, ApiState, ChecksResponse, HealthResponse, OutputsResponse, spawn_api_server},
    config::ActionMeta,
    metrics::CheckMetrics,
    storage::{AuditStore, MemoryBackend},
};
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::Value;

struct TestApi {
    addr: SocketAddr,
    store: Arc<MemoryBackend>,
    metrics: CheckMetrics,
    client: reqwest::Client,
}

impl TestApi {
    async fn spawn() -> Self {
        let store = Arc::new(MemoryBackend::new());
        let metrics = CheckMetrics::new().unwrap();
        let state = ApiState::new(store.clone(), metrics.clone());

        let config = ApiConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        };

        Self {
            addr: spawn_api_server(config, state).await.unwrap(),
            store,
            metrics,
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("http://{}{path}", self.addr))
            .send()
            .await
            .unwrap()
    }
}

fn output(rc: i32, offset_secs: i64) -> Output {
    let mut output = Output::pending(Utc::now() + Duration::seconds(offset_secs));
    output.rc = rc;
    output.combined_out = format!("exit {rc}");
    output.settle();
    output
}

#[tokio::test]
async fn test_health_reports_store() {
    let api = TestApi::spawn().await;

    let response = api.get("/api/v1/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: HealthResponse = response.json().await.unwrap();
    assert_eq!(body.status, "ok");
    assert!(body.storage.healthy);
}

#[tokio::test]
async fn test_list_checks() {
    let api = TestApi::spawn().await;
    api.store.put_check("root-fs", &output(0, 0)).await.unwrap();
    api.store.put_check("data-fs", &output(1, 0)).await.unwrap();

    let body: ChecksResponse = api.get("/api/v1/checks").await.json().await.unwrap();

    assert_eq!(body.count, 2);
    assert_eq!(body.checks, vec!["data-fs".to_string(), "root-fs".to_string()]);
}

#[tokio::test]
async fn test_list_outputs_oldest_first_with_limit() {
    let api = TestApi::spawn().await;
    for (rc, offset) in [(2, 20), (0, 0), (1, 10)] {
        api.store
            .put_check("disk-fill", &output(rc, offset))
            .await
            .unwrap();
    }

    let body: OutputsResponse = api
        .get("/api/v1/checks/disk-fill/outputs?limit=2")
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body.check, "disk-fill");
    assert_eq!(body.count, 2);
    let rcs: Vec<_> = body.outputs.iter().map(|o| o.rc).collect();
    assert_eq!(rcs, vec![0, 1]);

    let all: OutputsResponse = api
        .get("/api/v1/checks/disk-fill/outputs")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(all.count, 3);
}

#[tokio::test]
async fn test_invalid_limit_is_rejected() {
    let api = TestApi::spawn().await;

    let response = api.get("/api/v1/checks/disk-fill/outputs?limit=0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn test_get_output_and_action_by_key() {
    let api = TestApi::spawn().await;

    let mut action_output = ActionOutput::pending(Utc::now());
    action_output.rc = 0;
    action_output.settle();
    let action = ActionMeta {
        name: "page".to_string(),
        actioner: "webhook".to_string(),
        action: "notify".to_string(),
        params: Default::default(),
    };
    let action_key = api
        .store
        .put_action("disk-fill", &action, &action_output)
        .await
        .unwrap();

    let mut check_output = output(2, 0);
    check_output.action_keys.push(action_key.clone());
    let key = api.store.put_check("disk-fill", &check_output).await.unwrap();

    let fetched: Output = api
        .get(&format!("/api/v1/checks/disk-fill/outputs/{key}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, check_output);

    let fetched: ActionOutput = api
        .get(&format!("/api/v1/actions/{action_key}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, action_output);
}

#[tokio::test]
async fn test_unknown_keys_are_not_found() {
    let api = TestApi::spawn().await;

    let response = api.get("/api/v1/checks/disk-fill/outputs/123").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = api.get("/api/v1/actions/disk-fill_page_123").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let api = TestApi::spawn().await;
    api.metrics.processed("disk-fill");
    api.metrics.failed("disk-fill");

    let response = api.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );

    let text = response.text().await.unwrap();
    assert!(text.contains("algowatch_checks_processed_total{check=\"disk-fill\"} 1"));
    assert!(text.contains("algowatch_checks_failed_total{check=\"disk-fill\"} 1"));
}
