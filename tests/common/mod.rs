#![allow(dead_code)]

pub use tasker_test_utils::{InlineSpawner, ParkingSpawner, RecordingSink, builders, init_tracing};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Generous upper bound for runs that are expected to finish.
pub const WAIT: Duration = Duration::from_secs(10);

pub fn sleep_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}

/// Shared boolean observed across work functions.
#[derive(Debug, Clone, Default)]
pub struct Flag(Arc<AtomicBool>);

impl Flag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-task invocation counter.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<Mutex<HashMap<String, usize>>>);

impl Calls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, task: &str) {
        *self.0.lock().unwrap().entry(task.to_string()).or_default() += 1;
    }

    pub fn count(&self, task: &str) -> usize {
        self.0.lock().unwrap().get(task).copied().unwrap_or(0)
    }
}
