//! Message types for actor communication
//!
//! Commands are request/response messages sent to one scheduler via mpsc.
//! Replies travel back on a oneshot channel.

use tokio::sync::oneshot;

use crate::executor::{RunError, RunReport};

/// Commands that can be sent to a [`CheckScheduler`](super::scheduler::CheckScheduler)
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run the check right away, outside the timer
    ///
    /// The run happens inside the scheduler loop, so it never overlaps a
    /// timer-driven run of the same check.
    RunNow {
        respond_to: oneshot::Sender<Result<RunReport, RunError>>,
    },

    /// Stop the scheduler after any in-flight run
    Shutdown,
}
