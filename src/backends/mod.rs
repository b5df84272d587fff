//! Pluggable algorithm and action backends
//!
//! Backends are selected per run by the string type a check (or action)
//! declares, through the [`registry::Registry`].
//!
//! ## Contract
//!
//! Both capabilities return the record they produced even when the
//! invocation fails: the error side carries a partially populated record
//! (`rc = -1`, failed) so the executor can always persist something.
//! Implementations must stop once the run's context is cancelled.
//!
//! ## Backends
//!
//! - **python** (algorithmer): runs `<directory>/<algorithm>.py` with JSON inputs/params
//! - **script** (actioner): runs `<directory>/<action>` with the check output
//! - **webhook** (actioner): posts a JSON payload
//! - **discord** (actioner): posts an embed to a Discord webhook

pub mod discord;
pub mod process;
pub mod python;
pub mod registry;
pub mod script;
pub mod webhook;

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::context::RunContext;
use crate::measure::MeasurementResult;
use crate::{ActionOutput, Output};

pub use registry::Registry;

/// A failed invocation together with whatever it produced before failing
#[derive(Debug)]
pub struct InvocationFailure<T> {
    pub output: T,
    pub error: anyhow::Error,
}

impl<T> InvocationFailure<T> {
    pub fn new(output: T, error: anyhow::Error) -> Self {
        Self { output, error }
    }
}

impl<T> std::fmt::Display for InvocationFailure<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

pub type AlgorithmResult = Result<Output, InvocationFailure<Output>>;

pub type ActionResult = Result<ActionOutput, InvocationFailure<ActionOutput>>;

/// Evaluates a check's inputs into a pass/fail [`Output`]
#[async_trait]
pub trait Algorithmer: Send + Sync {
    /// `working_dir` is exclusive to this run and removed by the caller afterwards.
    async fn apply(
        &self,
        ctx: &RunContext,
        algorithm: &str,
        params: &HashMap<String, String>,
        inputs: &HashMap<String, MeasurementResult>,
        working_dir: &Path,
    ) -> AlgorithmResult;
}

/// Notifies or remediates after a check failed
#[async_trait]
pub trait Actioner: Send + Sync {
    /// `prior_output` is the combined output of the failed check run.
    async fn act(
        &self,
        ctx: &RunContext,
        action: &str,
        prior_output: &str,
        params: &HashMap<String, String>,
        working_dir: &Path,
    ) -> ActionResult;
}
