//! Resource pack (§2.1, §5).
//!
//! Holds the three counting/binary semaphores from the original design — `BARRIER`
//! (admission control, Reactive mode), `ACCEPT` (serializes `accept` among Pool
//! workers), and `MUTEX` (guards the live-task table) — re-expressed as in-process
//! Tokio primitives per the re-architecture hint in §9. OS named semaphores are not
//! used: the core is single-process, so there is nothing to share across processes.
//!
//! The original's `atexit`-registered cleanup registry has no direct counterpart
//! here; it is replaced by ordinary RAII — the listen socket, the logging
//! [`tracing_appender::non_blocking::WorkerGuard`], and the task table all close or
//! flush when dropped at the end of `main`.
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::info;

/// Shared concurrency-control state for the Reactive and Pool strategies.
///
/// Iterative mode does not use this at all (see §4.2 — it never acquires `BARRIER`).
pub struct Resources {
    /// Counts available connection slots; starts at `max_clients`. Acquired before
    /// `accept` in Reactive mode, released exactly once per admission. `Arc`-wrapped
    /// so a held permit can outlive the borrow of `Resources` across a spawned task.
    pub barrier: Arc<Semaphore>,
    /// Serializes `accept` among Pool workers (binary semaphore, one permit).
    accept_gate: Semaphore,
    /// Live task handles, guarded by `MUTEX`'s in-process counterpart.
    table: Mutex<Vec<JoinHandle<()>>>,
    pub max_clients: usize,
}

impl Resources {
    pub fn new(max_clients: usize) -> Arc<Self> {
        Arc::new(Resources {
            barrier: Arc::new(Semaphore::new(max_clients)),
            accept_gate: Semaphore::new(1),
            table: Mutex::new(Vec::with_capacity(max_clients)),
            max_clients,
        })
    }

    /// Acquires one `BARRIER` permit, blocking while `max_clients` admissions
    /// are already outstanding (§4.2 Reactive step 1).
    pub async fn acquire_barrier(&self) -> OwnedSemaphorePermit {
        Arc::clone(&self.barrier)
            .acquire_owned()
            .await
            .expect("barrier never closed")
    }

    /// Acquires the `ACCEPT` permit, runs `accept_fn`, releases it, and returns the
    /// result — matching "only one worker at a time calls `accept`" in Pool mode.
    pub async fn serialize_accept<F, Fut, T>(&self, accept_fn: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let _permit = self.accept_gate.acquire().await.expect("accept_gate never closed");
        accept_fn().await
    }

    /// Registers a task handle under `MUTEX`, enforcing `n_threads <= max_clients`
    /// is the caller's responsibility (the table itself has no fixed capacity check
    /// beyond what `barrier` already admits).
    pub async fn register(&self, handle: JoinHandle<()>) {
        self.table.lock().await.push(handle);
    }

    /// Removes a finished or cancelled task's handle from the table under `MUTEX`.
    /// Compaction happens via `Vec::retain`, the safe-Rust equivalent of the
    /// original's tail-shift after decrementing `n_threads`.
    pub async fn deregister(&self, id: tokio::task::Id) {
        let mut table = self.table.lock().await;
        table.retain(|h| h.id() != id);
    }

    pub async fn live_count(&self) -> usize {
        self.table.lock().await.len()
    }

    /// Shutdown sequence from §5: abort every live handle, sleep to let scoped
    /// cleanups run, then log and return so the caller can drop remaining resources.
    pub async fn shutdown(&self) {
        {
            let table = self.table.lock().await;
            for handle in table.iter() {
                handle.abort();
            }
        }
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        info!("Server closed");
    }
}

/// Scoped cleanup for one Reactive worker (§4.2, §5): releases its `BARRIER`
/// permit and removes its own entry from the task table. Expressed as a
/// `Drop` impl so both paths fire whether the worker returns normally or is
/// aborted by [`Resources::shutdown`] — the same guarantee the original's
/// `pthread_cleanup_push` gave.
pub struct ConnectionGuard {
    resources: Arc<Resources>,
    task_id: JoinHandleId,
    _barrier_permit: OwnedSemaphorePermit,
}

/// `tokio::task::Id` is `Copy`, kept under a type alias so this module reads
/// the same whichever way it is spelled in a given Tokio release.
type JoinHandleId = tokio::task::Id;

impl ConnectionGuard {
    pub fn new(
        resources: Arc<Resources>,
        task_id: JoinHandleId,
        barrier_permit: OwnedSemaphorePermit,
    ) -> Self {
        ConnectionGuard {
            resources,
            task_id,
            _barrier_permit: barrier_permit,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let resources = Arc::clone(&self.resources);
        let id = self.task_id;
        // `deregister` takes the table's async mutex, so the actual removal is
        // handed to a short-lived task; the `BARRIER` permit above is released
        // synchronously, right here, by its own `Drop`.
        tokio::spawn(async move {
            resources.deregister(id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_deregister_tracks_count() {
        let resources = Resources::new(4);
        let handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        });
        let id = handle.id();
        resources.register(handle).await;
        assert_eq!(resources.live_count().await, 1);
        resources.deregister(id).await;
        assert_eq!(resources.live_count().await, 0);
    }

    #[tokio::test]
    async fn accept_gate_serializes() {
        let resources = Resources::new(1);
        let out = resources.serialize_accept(|| async { 42 }).await;
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn connection_guard_releases_barrier_on_drop() {
        let resources = Resources::new(1);
        let permit = resources.acquire_barrier().await;
        assert_eq!(resources.barrier.available_permits(), 0);

        let handle = tokio::spawn(async {});
        let id = handle.id();
        resources.register(handle).await;

        let guard = ConnectionGuard::new(Arc::clone(&resources), id, permit);
        drop(guard);

        assert_eq!(resources.barrier.available_permits(), 1);
    }
}
