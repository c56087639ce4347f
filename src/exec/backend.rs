// src/exec/backend.rs

//! Pluggable execution backend.
//!
//! The graph hands every admitted node to a [`Spawner`] instead of creating
//! threads itself. Production code uses [`TokioSpawner`] (blocking pool of
//! the current runtime) or [`ThreadSpawner`]; tests can plug in a spawner
//! that runs jobs inline.

use std::sync::Arc;
use std::thread;

use tokio::runtime::Handle;
use tracing::debug;

use crate::errors::{Result, TaskerError};

/// One execution unit: runs a node's work and its follow-up sweep.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Trait abstracting how admitted nodes are executed.
pub trait Spawner: Send + Sync {
    /// Start `job` for node `node` on an independently scheduled unit of
    /// concurrency. Must not wait for the job to finish.
    ///
    /// On error the job is dropped without running; the graph then settles
    /// the node as failed. A job accepted with `Ok` but dropped unexecuted
    /// (e.g. by a runtime that shut down) settles the node the same way.
    fn spawn(&self, node: &str, job: Job) -> Result<()>;
}

/// Runs jobs on a tokio runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawner bound to the runtime of the calling thread, if there is one.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Spawner for TokioSpawner {
    fn spawn(&self, node: &str, job: Job) -> Result<()> {
        debug!(task = %node, "dispatching task to tokio blocking pool");
        // Detached: completion is observed through the graph's counters. A
        // runtime that is shutting down drops the job, which the graph sees.
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }
}

/// Runs every job on its own named OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, node: &str, job: Job) -> Result<()> {
        thread::Builder::new()
            .name(format!("tasker-{node}"))
            .spawn(job)
            .map(|_| ())
            .map_err(|e| TaskerError::Spawn {
                node: node.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Tokio's blocking pool when a runtime is current, plain threads otherwise.
pub fn default_spawner() -> Arc<dyn Spawner> {
    match TokioSpawner::current() {
        Some(s) => Arc::new(s),
        None => Arc::new(ThreadSpawner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn thread_spawner_runs_job() {
        let (tx, rx) = mpsc::channel();
        ThreadSpawner
            .spawn("t", Box::new(move || tx.send(thread::current().name().map(str::to_string)).unwrap()))
            .unwrap();
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("tasker-t"));
    }

    #[test]
    fn default_spawner_without_runtime_is_threads() {
        assert!(TokioSpawner::current().is_none());
        let _ = default_spawner();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tokio_spawner_runs_job() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        TokioSpawner::current()
            .expect("inside runtime")
            .spawn("t", Box::new(move || tx.send(7).unwrap()))
            .unwrap();
        assert_eq!(rx.await.unwrap(), 7);
    }
}
