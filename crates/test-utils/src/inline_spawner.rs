use std::sync::atomic::{AtomicUsize, Ordering};

use tasker::errors::{Result, TaskerError};
use tasker::exec::{Job, Spawner};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Mode {
    #[default]
    Run,
    Refuse,
    Drop,
}

/// A spawner that:
/// - runs each job synchronously on the calling thread
/// - counts how many jobs it was handed
/// - can be told to refuse every spawn, or to accept and silently drop
///   every job, to exercise launches that never execute.
///
/// With this spawner `Graph::run` only returns once the whole run is done,
/// which makes ordering deterministic in tests.
#[derive(Debug, Default)]
pub struct InlineSpawner {
    spawned: AtomicUsize,
    mode: Mode,
}

impl InlineSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing() -> Self {
        Self {
            mode: Mode::Refuse,
            ..Self::default()
        }
    }

    /// Accepts every job (returns `Ok`) but drops it unexecuted.
    pub fn dropping() -> Self {
        Self {
            mode: Mode::Drop,
            ..Self::default()
        }
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl Spawner for InlineSpawner {
    fn spawn(&self, node: &str, job: Job) -> Result<()> {
        match self.mode {
            Mode::Refuse => Err(TaskerError::Spawn {
                node: node.to_string(),
                reason: "spawner refuses work".to_string(),
            }),
            Mode::Drop => {
                self.spawned.fetch_add(1, Ordering::SeqCst);
                drop(job);
                Ok(())
            }
            Mode::Run => {
                self.spawned.fetch_add(1, Ordering::SeqCst);
                job();
                Ok(())
            }
        }
    }
}
