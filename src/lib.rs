pub mod actors;
#[cfg(feature = "api")]
pub mod api;
pub mod backends;
pub mod config;
pub mod context;
pub mod executor;
pub mod lifecycle;
pub mod measure;
pub mod metrics;
pub mod storage;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single algorithm or action invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Failed,
}

impl Status {
    /// A run only succeeds when it exited with 0 and nothing went wrong invoking it.
    pub fn from_run(rc: i32, invocation_failed: bool) -> Self {
        if rc == 0 && !invocation_failed {
            Status::Success
        } else {
            Status::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result record of one algorithm invocation for a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Exit code of the backend, -1 if it never ran
    pub rc: i32,

    /// Interleaved stdout/stderr (or response body for HTTP backends)
    pub combined_out: String,

    /// Start of the run (always UTC)
    pub timestamp: DateTime<Utc>,

    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Audit keys of the actions this run dispatched, in dispatch order
    #[serde(default)]
    pub action_keys: Vec<String>,
}

impl Output {
    /// A not-yet-run output: `rc = -1`, failed, no output.
    pub fn pending(timestamp: DateTime<Utc>) -> Self {
        Self {
            rc: -1,
            combined_out: String::new(),
            timestamp,
            status: Status::Failed,
            error: None,
            action_keys: Vec::new(),
        }
    }

    /// Recompute `status` from `rc` and `error`.
    pub fn settle(&mut self) {
        self.status = Status::from_run(self.rc, self.error.is_some());
    }
}

/// Result record of one action invocation
///
/// Same shape as [`Output`], without action keys: actions never trigger actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutput {
    pub rc: i32,
    pub combined_out: String,
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutput {
    pub fn pending(timestamp: DateTime<Utc>) -> Self {
        Self {
            rc: -1,
            combined_out: String::new(),
            timestamp,
            status: Status::Failed,
            error: None,
        }
    }

    pub fn settle(&mut self) {
        self.status = Status::from_run(self.rc, self.error.is_some());
    }
}
