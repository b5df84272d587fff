//! In-memory audit store (no persistence)
//!
//! Useful for tests and for running without a database. Keeps the same
//! ordering and overwrite semantics as the SQLite backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{AuditStore, HealthStatus};
use super::error::StorageResult;
use super::schema::{action_key, check_key};
use crate::config::ActionMeta;
use crate::{ActionOutput, Output};

#[derive(Default)]
pub struct MemoryBackend {
    /// check name -> run key -> output
    checks: RwLock<BTreeMap<String, BTreeMap<String, Output>>>,

    actions: RwLock<BTreeMap<String, ActionOutput>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryBackend {
    async fn put_check(&self, check_name: &str, output: &Output) -> StorageResult<String> {
        let key = check_key(&output.timestamp);
        self.checks
            .write()
            .await
            .entry(check_name.to_string())
            .or_default()
            .insert(key.clone(), output.clone());
        Ok(key)
    }

    async fn get_check(&self, check_name: &str, key: &str) -> StorageResult<Option<Output>> {
        Ok(self
            .checks
            .read()
            .await
            .get(check_name)
            .and_then(|partition| partition.get(key))
            .cloned())
    }

    async fn list_check_names(&self) -> StorageResult<Vec<String>> {
        Ok(self.checks.read().await.keys().cloned().collect())
    }

    async fn list_check_outputs(
        &self,
        check_name: &str,
        limit: usize,
    ) -> StorageResult<Vec<Output>> {
        debug!("listing up to {limit} outputs for {check_name}");
        Ok(self
            .checks
            .read()
            .await
            .get(check_name)
            .map(|partition| partition.values().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn put_action(
        &self,
        check_name: &str,
        action: &ActionMeta,
        output: &ActionOutput,
    ) -> StorageResult<String> {
        let key = action_key(check_name, &action.name, &output.timestamp);
        self.actions
            .write()
            .await
            .insert(key.clone(), output.clone());
        Ok(key)
    }

    async fn get_action(&self, key: &str) -> StorageResult<Option<ActionOutput>> {
        Ok(self.actions.read().await.get(key).cloned())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let checks = self.checks.read().await;
        let outputs: usize = checks.values().map(BTreeMap::len).sum();
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("check_outputs".to_string(), outputs.to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
