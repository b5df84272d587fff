//! Shell process execution shared by the process-based backends

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::context::RunContext;

/// Exit status and interleaved output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    /// Exit code, -1 when the process was terminated by a signal
    pub rc: i32,
    pub combined: String,
}

/// Run `script` through `sh -c` inside `working_dir`.
///
/// The process inherits the agent's environment plus `env`. stderr is
/// folded into stdout so the output keeps its original interleaving.
/// The shell runs in its own process group, and the whole group is killed
/// as soon as `ctx` is cancelled, so nothing it started outlives the run.
pub async fn run_shell(
    ctx: &RunContext,
    script: &str,
    working_dir: &Path,
    env: &HashMap<String, String>,
) -> Result<Completed> {
    trace!("spawning `{script}` in {}", working_dir.display());

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(format!("exec 2>&1; {script}"))
        .current_dir(working_dir)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn().context("failed to spawn shell")?;
    let pid = child.id();

    // dropping the wait future drops the child, which kills the shell itself
    let output = tokio::select! {
        output = child.wait_with_output() => output.context("failed to wait for process")?,
        _ = ctx.cancelled() => {
            debug!("run cancelled, killing process group");
            if let Some(pid) = pid {
                kill_group(pid);
            }
            bail!("process cancelled");
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(Completed {
        rc: output.status.code().unwrap_or(-1),
        combined,
    })
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // ESRCH: the group is already gone
        trace!("killpg({pgid}) failed: {e}");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

/// Quote `value` for safe interpolation into a `sh -c` script.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
