//! Failure tests for the run executor
//!
//! These tests verify that the engine handles failures gracefully:
//! - Unreachable or erroring datasources
//! - Misconfigured checks
//! - Failing actions
//! - A broken audit store

use std::sync::Arc;

use algowatch::{
    ActionOutput, Output, Status,
    config::ActionMeta,
    executor::RunError,
    storage::{AuditStore, HealthStatus, MemoryBackend, StorageError, StorageResult},
};
use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

/// Rejects every write
struct BrokenStore;

#[async_trait]
impl AuditStore for BrokenStore {
    async fn put_check(&self, _check_name: &str, _output: &Output) -> StorageResult<String> {
        Err(StorageError::QueryFailed("disk full".to_string()))
    }

    async fn get_check(&self, _check_name: &str, _key: &str) -> StorageResult<Option<Output>> {
        Ok(None)
    }

    async fn list_check_names(&self) -> StorageResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn list_check_outputs(
        &self,
        _check_name: &str,
        _limit: usize,
    ) -> StorageResult<Vec<Output>> {
        Ok(Vec::new())
    }

    async fn put_action(
        &self,
        _check_name: &str,
        _action: &ActionMeta,
        _output: &ActionOutput,
    ) -> StorageResult<String> {
        Err(StorageError::QueryFailed("disk full".to_string()))
    }

    async fn get_action(&self, _key: &str) -> StorageResult<Option<ActionOutput>> {
        Ok(None)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: false,
            message: "disk full".to_string(),
            metadata: Default::default(),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

async fn webhook_answering(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_datasource_error_aborts_before_algorithm() {
    let prometheus = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "parse error at char 5"
        })))
        .mount(&prometheus)
        .await;
    let webhook = webhook_answering(200).await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(MemoryBackend::new()));

    let err = harness
        .executor
        .execute(&disk_fill_check("failing"))
        .await
        .unwrap_err();

    match err {
        RunError::Measurement { input, message } => {
            assert_eq!(input, "usage");
            assert!(message.contains("bad_data"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(harness.store.list_check_names().await.unwrap().is_empty());
    assert_eq!(harness.counts("disk-fill"), (1, 0, 1));
    assert!(harness.work_dir_is_empty());
    assert!(webhook.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_datasource() {
    let webhook = webhook_answering(200).await;
    let algorithms = algorithm_dir();
    // nothing listens on port 9 (discard)
    let config = config(
        "http://127.0.0.1:9",
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(MemoryBackend::new()));

    let err = harness
        .executor
        .execute(&disk_fill_check("failing"))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Measurement { .. }));
    assert!(harness.work_dir_is_empty());
}

#[tokio::test]
async fn test_unknown_datasource_leaves_no_trace() {
    let prometheus = mock_prometheus("0.97").await;
    let webhook = webhook_answering(200).await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(MemoryBackend::new()));

    let mut check = disk_fill_check("failing");
    check.inputs[0].datasource = "prom2".to_string();

    let err = harness.executor.execute(&check).await.unwrap_err();

    assert!(matches!(
        err,
        RunError::DatasourceNotFound { ref datasource, .. } if datasource == "prom2"
    ));
    assert!(harness.store.list_check_names().await.unwrap().is_empty());
    assert_eq!(harness.counts("disk-fill"), (1, 0, 1));
    assert!(harness.work_dir_is_empty());
    assert!(prometheus.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_algorithmer_only_counts_processed() {
    let prometheus = mock_prometheus("0.97").await;
    let webhook = webhook_answering(200).await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(MemoryBackend::new()));

    let mut check = disk_fill_check("failing");
    check.algorithmer_type = "julia".to_string();

    let err = harness.executor.execute(&check).await.unwrap_err();

    assert!(matches!(err, RunError::AlgorithmerNotFound(_)));
    assert_eq!(harness.counts("disk-fill"), (1, 0, 0));
    assert!(prometheus.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_algorithm_script_is_a_failed_verdict() {
    let prometheus = mock_prometheus("0.97").await;
    let webhook = webhook_answering(200).await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(MemoryBackend::new()));

    let report = harness
        .executor
        .execute(&disk_fill_check("does_not_exist"))
        .await
        .unwrap();

    assert_eq!(report.status(), Status::Failed);
    assert_ne!(report.output.rc, 0);
    assert_eq!(report.output.action_keys.len(), 1);
}

#[tokio::test]
async fn test_failing_webhook_is_recorded() {
    let prometheus = mock_prometheus("0.97").await;
    let webhook = webhook_answering(503).await;
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

    assert_eq!(report.output.action_keys.len(), 1);
    let action = harness
        .store
        .get_action(&report.output.action_keys[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(action.rc, 503);
    assert_eq!(action.status, Status::Failed);
    assert_eq!(harness.counts("disk-fill"), (1, 0, 1));
}

#[tokio::test]
async fn test_unresolved_actioner_does_not_stop_later_actions() {
    let prometheus = mock_prometheus("0.97").await;
    let webhook = webhook_answering(200).await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(MemoryBackend::new()));

    let mut check = disk_fill_check("failing");
    check.actions.insert(
        0,
        ActionMeta {
            name: "sms".to_string(),
            actioner: "twilio".to_string(),
            action: "text".to_string(),
            params: Default::default(),
        },
    );

    let report = harness.executor.execute(&check).await.unwrap();

    assert_eq!(report.output.action_keys.len(), 1);
    assert!(report.output.action_keys[0].starts_with("disk-fill_page_"));
    assert_eq!(webhook.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_broken_store_does_not_change_outcome() {
    let prometheus = mock_prometheus("0.97").await;
    let webhook = webhook_answering(200).await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, Arc::new(BrokenStore));

    let report = harness
        .executor
        .execute(&disk_fill_check("failing"))
        .await
        .unwrap();

    assert_eq!(report.status(), Status::Failed);
    assert!(report.key.is_none());
    assert!(report.output.action_keys.is_empty());
    assert_eq!(webhook.received_requests().await.unwrap().len(), 1);
    assert_eq!(harness.counts("disk-fill"), (1, 0, 1));
}
