//! End-to-end runs through the real backends
//!
//! Prometheus and the webhook receiver are wiremock servers; the algorithm
//! is a shell script run by the python backend with `sh` as interpreter.

use std::sync::Arc;

use algowatch::{Status, storage::MemoryBackend};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

async fn mock_webhook(expected_calls: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({ "check": "disk-fill", "action": "notify" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("paged"))
        .expect(expected_calls)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_disk_fill_failure_pages_once() {
    let prometheus = mock_prometheus("0.97").await;
    let webhook = mock_webhook(1).await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(MemoryBackend::new()));

    let report = harness
        .executor
        .execute(&disk_fill_check("failing"))
        .await
        .unwrap();

    assert_eq!(report.status(), Status::Failed);
    assert_eq!(report.output.rc, 2);
    assert!(report.output.combined_out.contains("usage above threshold"));
    assert_eq!(report.output.action_keys.len(), 1);

    let action = harness
        .store
        .get_action(&report.output.action_keys[0])
        .await
        .unwrap()
        .expect("action output persisted");
    assert_eq!(action.status, Status::Success);
    assert_eq!(action.combined_out, "paged");

    let stored = harness
        .store
        .get_check("disk-fill", report.key.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, report.output);

    assert_eq!(harness.counts("disk-fill"), (1, 0, 1));
    assert!(harness.work_dir_is_empty());
}

#[tokio::test]
async fn test_disk_fill_success_dispatches_nothing() {
    let prometheus = mock_prometheus("0.42").await;
    let webhook = mock_webhook(0).await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(MemoryBackend::new()));

    let report = harness
        .executor
        .execute(&disk_fill_check("passing"))
        .await
        .unwrap();

    assert_eq!(report.status(), Status::Success);
    assert_eq!(report.output.rc, 0);
    assert!(report.output.action_keys.is_empty());
    assert_eq!(harness.counts("disk-fill"), (1, 1, 0));
    assert!(harness.work_dir_is_empty());
}

#[tokio::test]
async fn test_algorithm_sees_inputs_and_params() {
    let prometheus = mock_prometheus("0.97").await;
    let webhook = mock_webhook(1).await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(MemoryBackend::new()));

    let report = harness
        .executor
        .execute(&disk_fill_check("echo_inputs"))
        .await
        .unwrap();

    let out = &report.output.combined_out;
    assert!(out.contains(r#""usage""#), "inputs keyed by name: {out}");
    assert!(out.contains(r#""resultType":"vector""#), "{out}");
    assert!(out.contains(r#""0.97""#), "{out}");
    assert!(out.contains(r#""threshold":"0.9""#), "{out}");
}

#[tokio::test]
async fn test_range_input_uses_query_range() {
    let prometheus = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query_range"))
        .and(query_param("query", "disk_used_ratio"))
        .and(query_param("step", "60"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": { "resultType": "matrix", "result": [] }
        })))
        .expect(1)
        .mount(&prometheus)
        .await;
    let webhook = mock_webhook(0).await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(MemoryBackend::new()));

    let mut check = disk_fill_check("passing");
    check.inputs[0].range = Some(algowatch::config::QueryRange {
        lookback: 3600,
        step: 60,
    });

    let report = harness.executor.execute(&check).await.unwrap();
    assert_eq!(report.status(), Status::Success);
}

#[tokio::test]
async fn test_consecutive_runs_are_listed_in_order() {
    let prometheus = mock_prometheus("0.42").await;
    let webhook = mock_webhook(0).await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(MemoryBackend::new()));
    let check = disk_fill_check("passing");

    let mut keys = Vec::new();
    for _ in 0..3 {
        let report = harness.executor.execute(&check).await.unwrap();
        keys.push(report.key.unwrap());
    }

    let mut sorted = keys.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, keys, "keys are distinct and increasing");

    let outputs = harness
        .store
        .list_check_outputs("disk-fill", 10)
        .await
        .unwrap();
    assert_eq!(outputs.len(), 3);
    assert!(outputs.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(harness.counts("disk-fill"), (3, 3, 0));
}
