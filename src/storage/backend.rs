//! Audit store trait definition
//!
//! This module defines the `AuditStore` trait that all audit log
//! implementations must implement.

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::StorageResult;
use crate::config::ActionMeta;
use crate::{ActionOutput, Output};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Durable, ordered log of check and action outputs
///
/// Check outputs live in one partition per check name, ordered by key.
/// Action outputs live in a single flat namespace. See
/// [`schema`](super::schema) for the key layout.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`: every check task writes through
/// the same store. Write serialization is the implementation's job.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a check output, returning its key
    ///
    /// The key is derived from `output.timestamp`; writing the same run
    /// again replaces the earlier record.
    async fn put_check(&self, check_name: &str, output: &Output) -> StorageResult<String>;

    /// Fetch one check output, `None` if the check or key is unknown
    async fn get_check(&self, check_name: &str, key: &str) -> StorageResult<Option<Output>>;

    /// Names of all checks with at least one persisted output, sorted
    async fn list_check_names(&self) -> StorageResult<Vec<String>>;

    /// Up to `limit` outputs of a check, walking its keys from the oldest
    async fn list_check_outputs(&self, check_name: &str, limit: usize)
    -> StorageResult<Vec<Output>>;

    /// Persist an action output, returning its key
    async fn put_action(
        &self,
        check_name: &str,
        action: &ActionMeta,
        output: &ActionOutput,
    ) -> StorageResult<String>;

    /// Fetch one action output by key
    async fn get_action(&self, key: &str) -> StorageResult<Option<ActionOutput>>;

    /// Lightweight liveness probe
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Flush and release resources
    async fn close(&self) -> StorageResult<()>;
}
