//! Script action backend
//!
//! Runs `<directory>/<action>` through `sh` in the run's working directory.
//! The failed check's output is available as `check_output.txt`, the action
//! params as `params.json`; `ALGOWATCH_CHECK` and `ALGOWATCH_ACTION` name the
//! trigger.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use super::process::{run_shell, shell_quote};
use super::{ActionResult, Actioner, InvocationFailure};
use crate::ActionOutput;
use crate::config::ScriptActionerConfig;
use crate::context::RunContext;

pub const CHECK_OUTPUT_FILE: &str = "check_output.txt";
pub const PARAMS_FILE: &str = "params.json";

pub struct ScriptActioner {
    config: ScriptActionerConfig,
}

impl ScriptActioner {
    pub fn new(config: ScriptActionerConfig) -> Self {
        Self { config }
    }

    fn prepare(
        &self,
        working_dir: &Path,
        prior_output: &str,
        params: &HashMap<String, String>,
    ) -> anyhow::Result<()> {
        std::fs::write(working_dir.join(CHECK_OUTPUT_FILE), prior_output)
            .with_context(|| format!("failed to write {CHECK_OUTPUT_FILE}"))?;
        let params = serde_json::to_vec(params).context("failed to serialize params")?;
        std::fs::write(working_dir.join(PARAMS_FILE), params)
            .with_context(|| format!("failed to write {PARAMS_FILE}"))
    }
}

#[async_trait]
impl Actioner for ScriptActioner {
    #[instrument(skip_all, fields(check = %ctx.check(), action = %action))]
    async fn act(
        &self,
        ctx: &RunContext,
        action: &str,
        prior_output: &str,
        params: &HashMap<String, String>,
        working_dir: &Path,
    ) -> ActionResult {
        let mut output = ActionOutput::pending(Utc::now());

        if let Err(e) = self.prepare(working_dir, prior_output, params) {
            output.error = Some(format!("{e:#}"));
            return Err(InvocationFailure::new(output, e));
        }

        let script = self.config.directory.join(action);
        let command = format!(
            "sh {} {CHECK_OUTPUT_FILE} {PARAMS_FILE}",
            shell_quote(&script.to_string_lossy())
        );
        debug!("running {command}");

        let mut env = self.config.env_override.clone();
        env.insert("ALGOWATCH_CHECK".to_string(), ctx.check().to_string());
        env.insert("ALGOWATCH_ACTION".to_string(), action.to_string());

        match run_shell(ctx, &command, working_dir, &env).await {
            Ok(completed) => {
                output.rc = completed.rc;
                output.combined_out = completed.combined;
                output.settle();
                Ok(output)
            }
            Err(e) => {
                output.error = Some(format!("{e:#}"));
                Err(InvocationFailure::new(output, e))
            }
        }
    }
}
