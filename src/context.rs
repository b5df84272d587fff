//! Cancellable execution contexts for check runs
//!
//! Every run derives a [`RunContext`] from the process-wide [`Shutdown`]
//! broadcast. The run's own [`CancelHandle`] is registered by check name in
//! the shared [`CancelRegistry`] so the lifecycle coordinator can cancel
//! in-flight work without touching the scheduler loops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::trace;

/// Process-wide shutdown broadcast
///
/// Cloning shares the same underlying channel.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Flip the broadcast; every subscriber observes it, including late ones.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Derive a fresh, individually cancellable context for one run.
    pub fn child(&self, check: &str) -> (RunContext, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = RunContext {
            check: check.to_string(),
            cancel_rx: rx,
            shutdown_rx: self.tx.subscribe(),
        };
        (ctx, CancelHandle { tx: Arc::new(tx) })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of [`Shutdown`]
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn recv(&mut self) {
        wait_until_set(&mut self.rx).await;
    }
}

/// Cancels exactly one run
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Execution context threaded through a single run
///
/// Cancelled when either its own handle fires or the process shuts down.
/// Carries no deadline of its own.
#[derive(Clone)]
pub struct RunContext {
    check: String,
    cancel_rx: watch::Receiver<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RunContext {
    /// Name of the check this run belongs to
    pub fn check(&self) -> &str {
        &self.check
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow() || *self.shutdown_rx.borrow()
    }

    /// Resolves once the run is cancelled. Never resolves otherwise.
    pub async fn cancelled(&self) {
        let mut cancel_rx = self.cancel_rx.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::select! {
            _ = wait_until_set(&mut cancel_rx) => {}
            _ = wait_until_set(&mut shutdown_rx) => {}
        }
    }
}

/// A dropped sender means nobody can cancel anymore, so wait forever.
async fn wait_until_set(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|set| *set).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Check name -> cancel handle of its most recent run
#[derive(Clone, Default)]
pub struct CancelRegistry {
    handles: Arc<Mutex<HashMap<String, CancelHandle>>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for `check`, replacing the previous run's handle.
    pub fn register(&self, check: &str, handle: CancelHandle) {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        handles.insert(check.to_string(), handle);
    }

    /// Drop the entry for `check` if it still belongs to `handle`.
    pub fn deregister(&self, check: &str, handle: &CancelHandle) {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        if handles
            .get(check)
            .is_some_and(|current| Arc::ptr_eq(&current.tx, &handle.tx))
        {
            handles.remove(check);
        }
    }

    /// Snapshot of the registered handles taken under the lock
    pub fn snapshot(&self) -> Vec<(String, CancelHandle)> {
        let handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        handles
            .iter()
            .map(|(name, handle)| (name.clone(), handle.clone()))
            .collect()
    }

    /// Cancel every registered run. Returns the names that were cancelled.
    pub fn cancel_all(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .map(|(name, handle)| {
                trace!("cancelling run of {name}");
                handle.cancel();
                name
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
