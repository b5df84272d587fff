//! Python algorithm backend
//!
//! Writes the fetched inputs and the algorithm parameters as JSON into the
//! run's working directory and runs
//! `<interpreter> <directory>/<algorithm>.py --inputs inputs.json --params params.json`,
//! optionally inside a virtualenv. The script's exit code decides the check.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use super::process::{run_shell, shell_quote};
use super::{AlgorithmResult, Algorithmer, InvocationFailure};
use crate::Output;
use crate::config::PythonAlgorithmerConfig;
use crate::context::RunContext;
use crate::measure::MeasurementResult;

pub const INPUTS_FILE: &str = "inputs.json";
pub const PARAMS_FILE: &str = "params.json";

pub struct PythonAlgorithmer {
    config: PythonAlgorithmerConfig,
}

impl PythonAlgorithmer {
    pub fn new(config: PythonAlgorithmerConfig) -> Self {
        Self { config }
    }

    fn command(&self, algorithm: &str) -> String {
        let script = self.config.directory.join(format!("{algorithm}.py"));
        let run = format!(
            "{} {} --inputs {INPUTS_FILE} --params {PARAMS_FILE}",
            self.config.interpreter,
            shell_quote(&script.to_string_lossy()),
        );

        match &self.config.venv {
            Some(venv) => format!(
                ". {}; {run}",
                shell_quote(&venv.join("bin/activate").to_string_lossy())
            ),
            None => run,
        }
    }
}

fn write_json(dir: &Path, file: &str, value: &impl serde::Serialize) -> anyhow::Result<()> {
    let data = serde_json::to_vec(value).with_context(|| format!("failed to serialize {file}"))?;
    std::fs::write(dir.join(file), data).with_context(|| format!("failed to write {file}"))
}

#[async_trait]
impl Algorithmer for PythonAlgorithmer {
    #[instrument(skip_all, fields(check = %ctx.check(), algorithm = %algorithm))]
    async fn apply(
        &self,
        ctx: &RunContext,
        algorithm: &str,
        params: &HashMap<String, String>,
        inputs: &HashMap<String, MeasurementResult>,
        working_dir: &Path,
    ) -> AlgorithmResult {
        let mut output = Output::pending(Utc::now());

        let prepared = write_json(working_dir, INPUTS_FILE, inputs)
            .and_then(|_| write_json(working_dir, PARAMS_FILE, params));
        if let Err(e) = prepared {
            output.error = Some(format!("{e:#}"));
            return Err(InvocationFailure::new(output, e));
        }

        let command = self.command(algorithm);
        debug!("running {command}");

        match run_shell(ctx, &command, working_dir, &self.config.env_override).await {
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
