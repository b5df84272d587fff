//! Process-wide lifecycle coordination
//!
//! Owns the shutdown broadcast and the cancel registry every run registers
//! itself in. On shutdown it cancels the in-flight runs (from a snapshot
//! taken under the registry lock) and then flips the broadcast so every
//! scheduler loop exits. Shutdown never waits for runs to finish; callers
//! that want to give runs a chance to unwind use [`Lifecycle::drain`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::actors::CheckHandle;
use crate::config::Check;
use crate::context::{CancelRegistry, Shutdown};
use crate::executor::RunExecutor;

#[derive(Default)]
pub struct Lifecycle {
    shutdown: Shutdown,
    cancels: CancelRegistry,
    handles: Vec<CheckHandle>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcast to derive run contexts from
    pub fn shutdown_broadcast(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn cancel_registry(&self) -> &CancelRegistry {
        &self.cancels
    }

    /// Spawn one scheduler per check. Returns the number started.
    ///
    /// `executor` must have been built with this lifecycle's broadcast and
    /// registry (see [`RunExecutor::with_shutdown`]).
    pub fn start(
        &mut self,
        checks: impl IntoIterator<Item = Check>,
        executor: Arc<RunExecutor>,
    ) -> usize {
        let before = self.handles.len();
        for check in checks {
            debug!("scheduling check {}", check.name);
            self.handles.push(CheckHandle::spawn(
                check,
                executor.clone(),
                self.shutdown.subscribe(),
            ));
        }
        let started = self.handles.len() - before;
        info!("started {started} check scheduler(s)");
        started
    }

    pub fn handles(&self) -> &[CheckHandle] {
        &self.handles
    }

    pub fn handle(&self, check: &str) -> Option<&CheckHandle> {
        self.handles.iter().find(|h| h.name == check)
    }

    /// Resolves on SIGINT or SIGTERM, returning the signal's name.
    #[cfg(unix)]
    pub async fn wait_for_signal() -> Result<&'static str> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("received {name}");
        Ok(name)
    }

    /// Resolves on Ctrl-C.
    #[cfg(not(unix))]
    pub async fn wait_for_signal() -> Result<&'static str> {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        info!("received Ctrl-C");
        Ok("Ctrl-C")
    }

    /// Cancel every in-flight run, then stop every scheduler.
    ///
    /// Returns the names of the checks whose runs were cancelled.
    pub fn shutdown(&self) -> Vec<String> {
        let cancelled = self.cancels.cancel_all();
        if !cancelled.is_empty() {
            info!("cancelled in-flight runs: {}", cancelled.join(", "));
        }
        self.shutdown.trigger();
        cancelled
    }

    /// Wait up to `grace` for every scheduler to exit. Returns `true` if
    /// they all did.
    pub async fn drain(&self, grace: Duration) -> bool {
        let all_stopped = futures::future::join_all(self.handles.iter().map(|h| h.stopped()));

        match tokio::time::timeout(grace, all_stopped).await {
            Ok(_) => {
                debug!("all schedulers stopped");
                true
            }
            Err(_) => {
                let running: Vec<_> = self
                    .handles
                    .iter()
                    .filter(|h| !h.is_stopped())
                    .map(|h| h.name.as_str())
                    .collect();
                warn!(
                    "{} scheduler(s) still running after {:?}: {}",
                    running.len(),
                    grace,
                    running.join(", ")
                );
                false
            }
        }
    }
}
