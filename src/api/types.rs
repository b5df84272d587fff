//! API response bodies

use serde::{Deserialize, Serialize};

use crate::Output;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    pub timestamp: String,
    pub storage: StorageHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageHealth {
    pub healthy: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksResponse {
    pub checks: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsResponse {
    pub check: String,
    pub outputs: Vec<Output>,
    pub count: usize,
}
