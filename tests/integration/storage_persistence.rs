//! Integration tests for storage persistence
//!
//! These tests verify that:
//! - Runs executed against SQLite survive a restart
//! - Action outputs are reachable from the check output that triggered them
//! - Listing reflects exactly the checks that have recorded runs

use std::sync::Arc;

use algowatch::Status;
use algowatch::storage::{AuditStore, sqlite::SqliteBackend};
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

async fn accepting_webhook() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_failed_run_survives_restart() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("audit.db");

    let prometheus = mock_prometheus("0.97").await;
    let webhook = accepting_webhook().await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );

    let report = {
        let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        let harness = Harness::new(&config, backend.clone());
        let report = harness
            .executor
            .execute(&disk_fill_check("failing"))
            .await
            .unwrap();
        backend.close().await.unwrap();
        report
    };

    let backend = SqliteBackend::new(&db_path).await.unwrap();

    let stored = backend
        .get_check("disk-fill", report.key.as_deref().unwrap())
        .await
        .unwrap()
        .expect("check output persisted");
    assert_eq!(stored, report.output);
    assert_eq!(stored.status, Status::Failed);
    assert_eq!(stored.action_keys.len(), 1);

    let action = backend
        .get_action(&stored.action_keys[0])
        .await
        .unwrap()
        .expect("action output persisted");
    assert_eq!(action.rc, 0);
    assert_eq!(action.status, Status::Success);
}

#[tokio::test]
async fn test_listing_matches_recorded_checks() {
    let temp_dir = tempdir().unwrap();
    let backend = Arc::new(
        SqliteBackend::new(temp_dir.path().join("audit.db"))
            .await
            .unwrap(),
    );

    let prometheus = mock_prometheus("0.42").await;
    let webhook = accepting_webhook().await;
    let algorithms = algorithm_dir();
    let config = config(
        &prometheus.uri(),
        &format!("{}/hook", webhook.uri()),
        algorithms.path(),
    );
    let harness = Harness::new(&config, backend.clone());

    let mut root = disk_fill_check("passing");
    root.name = "root-fs".to_string();
    let mut data = disk_fill_check("passing");
    data.name = "data-fs".to_string();
    let mut orphan = disk_fill_check("passing");
    orphan.name = "orphan".to_string();
    orphan.inputs[0].datasource = "prom9".to_string();

    harness.executor.execute(&root).await.unwrap();
    harness.executor.execute(&root).await.unwrap();
    harness.executor.execute(&data).await.unwrap();
    assert!(harness.executor.execute(&orphan).await.is_err());

    let names = backend.list_check_names().await.unwrap();
    assert_eq!(names, vec!["data-fs".to_string(), "root-fs".to_string()]);

    let outputs = backend.list_check_outputs("root-fs", 50).await.unwrap();
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].timestamp < outputs[1].timestamp);
    assert!(outputs.iter().all(|o| o.status == Status::Success));
}
