//! API shared state

use std::sync::Arc;

use crate::metrics::CheckMetrics;
use crate::storage::AuditStore;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Audit log the check runs write to
    pub store: Arc<dyn AuditStore>,

    /// Counters exposed at `/metrics`
    pub metrics: CheckMetrics,
}

impl ApiState {
    pub fn new(store: Arc<dyn AuditStore>, metrics: CheckMetrics) -> Self {
        Self { store, metrics }
    }
}
