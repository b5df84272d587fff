//! Run executor
//!
//! Evaluates one check end to end:
//!
//! ```text
//! Init → InputsFetched → AlgorithmApplied → Succeeded ───────────────────→ Persisted
//!                                         ↘ Failed → ActionsDispatched ↗
//! ```
//!
//! Every run gets its own working directory under `base_working_dir`, removed
//! when the run ends however it ends (including when the task running it is
//! dropped). The run's [`RunContext`] is registered in the shared
//! [`CancelRegistry`] for as long as the run is in flight.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::backends::{Algorithmer, InvocationFailure, Registry};
use crate::config::{Check, Datasource};
use crate::context::{CancelHandle, CancelRegistry, RunContext, Shutdown};
use crate::measure::{MeasurementResult, Measurer};
use crate::metrics::CheckMetrics;
use crate::storage::AuditStore;
use crate::{Output, Status};

/// Why a run ended without a usable verdict
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("no algorithmer registered for type '{0}'")]
    AlgorithmerNotFound(String),

    #[error("datasource '{datasource}' of input '{input}' not found")]
    DatasourceNotFound { input: String, datasource: String },

    #[error("measuring input '{input}' failed: {message}")]
    Measurement { input: String, message: String },

    #[error("failed to create working directory: {0}")]
    WorkingDir(#[from] std::io::Error),

    /// The algorithm could not be invoked. Actions were still dispatched and
    /// the partial output persisted.
    #[error("algorithm '{algorithm}' failed: {message}")]
    Algorithm { algorithm: String, message: String },
}

/// Outcome of a run that produced a verdict
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Audit key of the check output, `None` if persisting it failed
    pub key: Option<String>,
    pub output: Output,
}

impl RunReport {
    pub fn status(&self) -> Status {
        self.output.status
    }
}

/// Drops the run's cancel handle from the registry when the run ends.
struct Registration<'a> {
    cancels: &'a CancelRegistry,
    check: &'a str,
    handle: CancelHandle,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.cancels.deregister(self.check, &self.handle);
    }
}

pub struct RunExecutor {
    datasources: Vec<Datasource>,
    registry: Registry,
    measurer: Arc<dyn Measurer>,
    store: Arc<dyn AuditStore>,
    metrics: CheckMetrics,
    shutdown: Shutdown,
    cancels: CancelRegistry,
    base_working_dir: PathBuf,
}

impl RunExecutor {
    pub fn new(
        registry: Registry,
        measurer: Arc<dyn Measurer>,
        store: Arc<dyn AuditStore>,
        metrics: CheckMetrics,
    ) -> Self {
        Self {
            datasources: Vec::new(),
            registry,
            measurer,
            store,
            metrics,
            shutdown: Shutdown::new(),
            cancels: CancelRegistry::new(),
            base_working_dir: std::env::temp_dir(),
        }
    }

    pub fn with_datasources(mut self, datasources: Vec<Datasource>) -> Self {
        self.datasources = datasources;
        self
    }

    /// Derive run contexts from `shutdown` and register them in `cancels`.
    pub fn with_shutdown(mut self, shutdown: Shutdown, cancels: CancelRegistry) -> Self {
        self.shutdown = shutdown;
        self.cancels = cancels;
        self
    }

    pub fn with_base_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_working_dir = dir.into();
        self
    }

    pub fn metrics(&self) -> &CheckMetrics {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Run `check` once.
    #[instrument(skip_all, fields(check = %check.name))]
    pub async fn execute(&self, check: &Check) -> Result<RunReport, RunError> {
        self.metrics.processed(&check.name);

        let algorithmer = self
            .registry
            .resolve_algorithmer(&check.algorithmer_type)
            .ok_or_else(|| RunError::AlgorithmerNotFound(check.algorithmer_type.clone()))?;

        let result = self.evaluate(check, algorithmer.as_ref()).await;
        match &result {
            Ok(report) if report.status() == Status::Success => {
                self.metrics.succeeded(&check.name)
            }
            _ => self.metrics.failed(&check.name),
        }
        result
    }

    async fn evaluate(
        &self,
        check: &Check,
        algorithmer: &dyn Algorithmer,
    ) -> Result<RunReport, RunError> {
        let working_dir = tempfile::Builder::new()
            .prefix(&format!("{}-", check.name))
            .tempdir_in(&self.base_working_dir)?;

        let (ctx, handle) = self.shutdown.child(&check.name);
        self.cancels.register(&check.name, handle.clone());
        let _registration = Registration {
            cancels: &self.cancels,
            check: &check.name,
            handle,
        };

        let started = Utc::now();
        let inputs = self.fetch_inputs(&ctx, check).await?;

        let (mut output, failure) = match algorithmer
            .apply(
                &ctx,
                &check.algorithm,
                &check.algorithm_params,
                &inputs,
                working_dir.path(),
            )
            .await
        {
            Ok(output) => (output, None),
            Err(InvocationFailure { output, error }) => (output, Some(error)),
        };

        output.timestamp = started;
        if let Some(e) = &failure {
            output.error.get_or_insert_with(|| format!("{e:#}"));
        }
        output.settle();

        if check.debug {
            debug!("combined output (rc={}):\n{}", output.rc, output.combined_out);
        }

        let mut key = self.persist_check(&check.name, &output).await;

        if output.status == Status::Success {
            info!("check passed");
            return Ok(RunReport { key, output });
        }

        warn!(
            "check failed (rc={}), dispatching {} action(s)",
            output.rc,
            check.actions.len()
        );
        if let Some(annotated) = self
            .dispatch_actions(&ctx, check, &mut output, working_dir.path())
            .await
        {
            key = Some(annotated);
        }

        match failure {
            Some(e) => Err(RunError::Algorithm {
                algorithm: check.algorithm.clone(),
                message: format!("{e:#}"),
            }),
            None => Ok(RunReport { key, output }),
        }
    }

    async fn fetch_inputs(
        &self,
        ctx: &RunContext,
        check: &Check,
    ) -> Result<HashMap<String, MeasurementResult>, RunError> {
        let mut inputs = HashMap::with_capacity(check.inputs.len());

        for input in &check.inputs {
            let datasource = self
                .datasources
                .iter()
                .find(|d| d.name == input.datasource)
                .ok_or_else(|| RunError::DatasourceNotFound {
                    input: input.name.clone(),
                    datasource: input.datasource.clone(),
                })?;

            let result = self
                .measurer
                .measure(ctx, datasource, input)
                .await
                .map_err(|e| RunError::Measurement {
                    input: input.name.clone(),
                    message: format!("{e:#}"),
                })?;

            inputs.insert(input.name.clone(), result);
        }

        Ok(inputs)
    }

    /// Runs every action in order, re-persisting `output` after each one.
    /// Returns the last key the check output was stored under.
    async fn dispatch_actions(
        &self,
        ctx: &RunContext,
        check: &Check,
        output: &mut Output,
        working_dir: &Path,
    ) -> Option<String> {
        let mut key = None;

        for action in &check.actions {
            let Some(actioner) = self.registry.resolve_actioner(&action.actioner) else {
                error!(
                    "no actioner registered for type '{}', skipping action '{}'",
                    action.actioner, action.name
                );
                continue;
            };

            let started = Utc::now();
            let mut action_output = match actioner
                .act(
                    ctx,
                    &action.action,
                    &output.combined_out,
                    &action.params,
                    working_dir,
                )
                .await
            {
                Ok(action_output) => action_output,
                Err(InvocationFailure {
                    output: mut partial,
                    error,
                }) => {
                    error!("action '{}' failed: {:#}", action.name, error);
                    partial.error.get_or_insert_with(|| format!("{error:#}"));
                    partial
                }
            };
            action_output.timestamp = started;
            action_output.settle();

            match self.store.put_action(&check.name, action, &action_output).await {
                Ok(action_key) => {
                    debug!("action '{}' recorded as {action_key}", action.name);
                    output.action_keys.push(action_key);
                }
                Err(e) => error!("failed to persist output of action '{}': {}", action.name, e),
            }

            key = self.persist_check(&check.name, output).await.or(key);
        }

        key
    }

    async fn persist_check(&self, check: &str, output: &Output) -> Option<String> {
        match self.store.put_check(check, output).await {
            Ok(key) => Some(key),
            Err(e) => {
                error!("failed to persist output of check {check}: {}", e);
                None
            }
        }
    }
}
