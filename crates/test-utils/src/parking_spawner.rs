use std::sync::Mutex;

use tasker::errors::Result;
use tasker::exec::{Job, Spawner};

/// A spawner that holds on to every job until the test decides what happens
/// to it: run it later, or throw it away like a runtime shutting down.
#[derive(Default)]
pub struct ParkingSpawner {
    parked: Mutex<Vec<(String, Job)>>,
}

impl ParkingSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the nodes whose jobs are waiting, in spawn order.
    pub fn parked(&self) -> Vec<String> {
        self.parked
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Run every parked job on the calling thread.
    pub fn run_all(&self) {
        loop {
            // Jobs may park successors while running, so don't hold the lock.
            let jobs = std::mem::take(&mut *self.parked.lock().unwrap());
            if jobs.is_empty() {
                break;
            }
            for (_, job) in jobs {
                job();
            }
        }
    }

    /// Drop every parked job without running it.
    pub fn discard_all(&self) {
        let jobs = std::mem::take(&mut *self.parked.lock().unwrap());
        drop(jobs);
    }
}

impl Spawner for ParkingSpawner {
    fn spawn(&self, node: &str, job: Job) -> Result<()> {
        self.parked.lock().unwrap().push((node.to_string(), job));
        Ok(())
    }
}
