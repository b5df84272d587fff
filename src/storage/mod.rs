//! Audit log persistence
//!
//! This module provides a trait-based abstraction for recording every
//! check run and every action it dispatched.
//!
//! ## Design
//!
//! - **Trait-based**: `AuditStore` allows swapping implementations
//! - **Async**: All operations are async for compatibility with the check tasks
//! - **Ordered**: Check outputs are partitioned per check and ordered by run start
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded, crash-durable database
//! - **In-Memory**: No persistence, for testing or `storage = none`
//!
//! ## Usage
//!
//! ```no_run
//! use algowatch::storage::{AuditStore, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./algowatch.db").await?;
//!     println!("{:?}", backend.list_check_names().await?);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{AuditStore, HealthStatus};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
