// src/dag/counter.rs

//! Liveness accounting: one counter per node name plus the signal that
//! wakes waiters whenever a counter drops.
//!
//! Nothing in here takes part in admission; it only answers
//! "is anything still running" and lets callers block until it isn't.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::warn;

/// Per-name atomic counter of in-flight executions.
#[derive(Debug, Default)]
pub struct RunCounter {
    value: AtomicUsize,
}

impl RunCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new value.
    pub fn increment(&self) -> usize {
        self.value.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the new value. Never goes below zero.
    pub fn decrement(&self) -> usize {
        self.try_decrement().unwrap_or(0)
    }

    /// `None` if the counter already was zero.
    fn try_decrement(&self) -> Option<usize> {
        self.value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1))
            .ok()
            .map(|prev| prev - 1)
    }

    pub fn value(&self) -> usize {
        self.value.load(Ordering::Acquire)
    }
}

/// Name-keyed counter table shared by every execution unit of a graph.
///
/// `in_flight` is the sum of all counters. Liveness reads only that one
/// cell, so a successor started before its predecessor stops is never
/// missed by a concurrent reader.
#[derive(Debug)]
pub(crate) struct RunCounters {
    counters: HashMap<String, RunCounter>,
    in_flight: AtomicUsize,
    lock: Mutex<()>,
    idle: Condvar,
    notify: Notify,
}

impl RunCounters {
    pub(crate) fn new<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            counters: names.into_iter().map(|n| (n, RunCounter::new())).collect(),
            in_flight: AtomicUsize::new(0),
            lock: Mutex::new(()),
            idle: Condvar::new(),
            notify: Notify::new(),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&RunCounter> {
        self.counters.get(name)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn start(&self, name: &str) {
        match self.counters.get(name) {
            Some(counter) => {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                counter.increment();
            }
            None => warn!(task = %name, "no run counter registered for task"),
        }
    }

    /// Decrement and wake every waiter.
    pub(crate) fn stop(&self, name: &str) {
        match self.counters.get(name) {
            Some(counter) => {
                if counter.try_decrement().is_some() {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                } else {
                    warn!(task = %name, "run counter released more often than started");
                }
            }
            None => warn!(task = %name, "no run counter registered for task"),
        }

        // Taking the lock orders this wake-up after any waiter that has
        // already checked `is_running` and is about to park.
        {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.idle.notify_all();
        }
        self.notify.notify_waiters();
    }

    /// Block until no counter is positive or `timeout` elapses.
    ///
    /// Returns `true` when the graph went quiet, `false` on timeout.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        while self.is_running() {
            guard = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (g, _) = self
                        .idle
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    g
                }
                None => self.idle.wait(guard).unwrap_or_else(PoisonError::into_inner),
            };
        }

        true
    }

    /// Async flavour of [`wait_idle`](Self::wait_idle).
    pub(crate) async fn wait_idle_async(&self, timeout: Duration) -> bool {
        let quiet = async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                // Register before checking so a concurrent `stop` can't slip
                // between the check and the await.
                notified.as_mut().enable();
                if !self.is_running() {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, quiet).await.is_ok()
    }
}
