//! CheckScheduler - Drives one check on its own cadence
//!
//! ## Timeline
//!
//! ```text
//! start ─[immediate run]─ jitter ─── interval ── run ── interval ── run ...
//!                           ↑
//!                    uniform in [0, interval), whole seconds
//! ```
//!
//! A run always completes before the next tick is awaited, so a check never
//! overlaps itself. Runs of different checks are independent tasks.
//!
//! The loop exits on the shutdown broadcast, on a `Shutdown` command, or when
//! every [`CheckHandle`] has been dropped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, error, info, instrument, warn};

use crate::config::Check;
use crate::context::ShutdownSignal;
use crate::executor::{RunError, RunExecutor, RunReport};

use super::messages::SchedulerCommand;

/// One-time startup delay for a check with the given interval
pub fn startup_jitter(interval: Duration) -> Duration {
    match interval.as_secs() {
        0 => Duration::ZERO,
        secs => Duration::from_secs(rand::thread_rng().gen_range(0..secs)),
    }
}

pub struct CheckScheduler {
    check: Check,
    executor: Arc<RunExecutor>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
    shutdown: ShutdownSignal,
    jitter: Duration,
}

/// What the loop should do after handling a command
enum Flow {
    Continue,
    Stop,
}

impl CheckScheduler {
    pub fn new(
        check: Check,
        executor: Arc<RunExecutor>,
        command_rx: mpsc::Receiver<SchedulerCommand>,
        shutdown: ShutdownSignal,
        jitter: Duration,
    ) -> Self {
        Self {
            check,
            executor,
            command_rx,
            shutdown,
            jitter,
        }
    }

    #[instrument(skip(self), fields(check = %self.check.name))]
    pub async fn run(mut self) {
        debug!(
            "starting scheduler (interval {}s, jitter {}s)",
            self.check.interval,
            self.jitter.as_secs()
        );

        if self.shutdown.is_triggered() {
            info!("shutdown already in progress, not scheduling");
            return;
        }

        if self.check.immediate {
            let _ = self.run_once().await;
        }

        if self.wait_out_jitter().await {
            self.tick_loop().await;
        }

        debug!("scheduler stopped");
    }

    /// Sleeps through the startup jitter. Returns `false` if the scheduler
    /// was told to stop meanwhile.
    async fn wait_out_jitter(&mut self) -> bool {
        let jitter = sleep(self.jitter);
        tokio::pin!(jitter);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.recv() => {
                    info!("shutdown observed during startup jitter");
                    return false;
                }

                cmd = self.command_rx.recv() => {
                    if let Flow::Stop = self.handle_command(cmd).await {
                        return false;
                    }
                }

                _ = &mut jitter => return true,
            }
        }
    }

    async fn tick_loop(&mut self) {
        let period = self.check.interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.recv() => {
                    info!("shutdown observed, leaving schedule");
                    break;
                }

                cmd = self.command_rx.recv() => {
                    if let Flow::Stop = self.handle_command(cmd).await {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let _ = self.run_once().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Option<SchedulerCommand>) -> Flow {
        match cmd {
            Some(SchedulerCommand::RunNow { respond_to }) => {
                debug!("received RunNow command");
                let result = self.run_once().await;
                let _ = respond_to.send(result);
                Flow::Continue
            }
            Some(SchedulerCommand::Shutdown) => {
                debug!("received shutdown command");
                Flow::Stop
            }
            None => {
                warn!("command channel closed, shutting down");
                Flow::Stop
            }
        }
    }

    /// Runs the check once. Errors are logged as a single line and never
    /// stop the schedule.
    async fn run_once(&self) -> Result<RunReport, RunError> {
        let result = self.executor.execute(&self.check).await;
        match &result {
            Ok(report) => debug!("run finished with status {}", report.status()),
            Err(e) => error!("run failed: {}", e),
        }
        result
    }
}

/// Handle for controlling a [`CheckScheduler`]
///
/// Cloneable; the scheduler keeps running as long as one clone is alive.
#[derive(Clone)]
pub struct CheckHandle {
    sender: mpsc::Sender<SchedulerCommand>,

    /// Name of the scheduled check
    pub name: String,
}

impl CheckHandle {
    /// Spawn a scheduler for `check` with a random startup jitter.
    pub fn spawn(check: Check, executor: Arc<RunExecutor>, shutdown: ShutdownSignal) -> Self {
        let jitter = startup_jitter(check.interval());
        Self::spawn_with_jitter(check, executor, shutdown, jitter)
    }

    pub fn spawn_with_jitter(
        check: Check,
        executor: Arc<RunExecutor>,
        shutdown: ShutdownSignal,
        jitter: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let name = check.name.clone();

        let actor = CheckScheduler::new(check, executor, cmd_rx, shutdown, jitter);
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            name,
        }
    }

    /// Run the check now and wait for the outcome.
    pub async fn run_now(&self) -> Result<Result<RunReport, RunError>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive run outcome")
    }

    /// Ask the scheduler to stop
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }

    /// Resolves once the scheduler task has exited.
    pub async fn stopped(&self) {
        self.sender.closed().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.sender.is_closed()
    }
}
