//! Actor-based check scheduling
//!
//! Each configured check runs in its own [`CheckScheduler`](scheduler::CheckScheduler)
//! task, controlled through a cloneable [`CheckHandle`](scheduler::CheckHandle).
//!
//! ## Architecture Overview
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │   Agent (main)   │
//!                 └────────┬─────────┘
//!                          │ spawns
//!            ┌─────────────┼─────────────┐
//!            │             │             │
//!    ┌───────▼──────┐      │     ┌───────▼──────┐
//!    │ Scheduler-1  │      │     │ Scheduler-N  │
//!    │ (check A)    │      │     │ (check N)    │
//!    └───────┬──────┘      │     └───────┬──────┘
//!            │             │             │
//!            └─────────────┼─────────────┘
//!                          │ execute
//!                 ┌────────▼─────────┐
//!                 │   RunExecutor    │ (shared)
//!                 └────────┬─────────┘
//!                          │
//!                 ┌────────▼─────────┐
//!                 │    AuditStore    │
//!                 └──────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each scheduler has an mpsc command channel for control messages
//! 2. **Broadcast**: Every scheduler selects on the process-wide shutdown signal
//! 3. **Request/Response**: oneshot channels for `RunNow`

pub mod messages;
pub mod scheduler;

pub use scheduler::{CheckHandle, CheckScheduler};
