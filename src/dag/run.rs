// src/dag/run.rs

//! Run-scoped state: the caller's context, the error policy and whatever a
//! run escalated.
//!
//! The policy lives here rather than on the graph so that two runs started
//! on the same graph never see each other's `continue_on_error`.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::dag::graph::Graph;
use crate::errors::{Result, TaskerError};

/// Options captured when a run starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// When `true`, an error raised by a work function only marks its node
    /// `Failed`. When `false` the error is escalated to the run handle and
    /// the failing execution unit stops driving the run.
    pub continue_on_error: bool,
}

impl RunOptions {
    pub fn continue_on_error() -> Self {
        Self {
            continue_on_error: true,
        }
    }
}

/// Shared by every execution unit launched on behalf of one run.
pub(crate) struct RunScope<C> {
    run_id: u64,
    context: Arc<C>,
    options: RunOptions,
    errors: Mutex<Vec<TaskerError>>,
}

impl<C> RunScope<C> {
    pub(crate) fn new(run_id: u64, context: Arc<C>, options: RunOptions) -> Self {
        Self {
            run_id,
            context,
            options,
            errors: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn run_id(&self) -> u64 {
        self.run_id
    }

    pub(crate) fn context(&self) -> &C {
        &self.context
    }

    pub(crate) fn options(&self) -> RunOptions {
        self.options
    }

    pub(crate) fn record(&self, error: TaskerError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }

    fn has_errors(&self) -> bool {
        !self
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    fn take_errors(&self) -> Vec<TaskerError> {
        std::mem::take(&mut *self.errors.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Handle to an in-flight run returned by [`Graph::run`].
///
/// Waiting through the handle (or the graph) never reports escalated errors;
/// inspect [`Graph::is_failed`] for that, or use [`join`](Self::join) /
/// [`take_errors`](Self::take_errors) to collect what the run's execution
/// units escalated.
pub struct RunHandle<C> {
    graph: Graph<C>,
    scope: Arc<RunScope<C>>,
}

impl<C> fmt::Debug for RunHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.scope.run_id)
            .field("options", &self.scope.options)
            .finish_non_exhaustive()
    }
}

impl<C: Send + Sync + 'static> RunHandle<C> {
    pub(crate) fn new(graph: Graph<C>, scope: Arc<RunScope<C>>) -> Self {
        Self { graph, scope }
    }

    pub fn run_id(&self) -> u64 {
        self.scope.run_id
    }

    pub fn options(&self) -> RunOptions {
        self.scope.options
    }

    pub fn graph(&self) -> &Graph<C> {
        &self.graph
    }

    /// Block until the graph is quiet or `timeout` elapses.
    ///
    /// Returns `true` if nothing is running anymore. In-flight work is never
    /// interrupted on timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.graph.wait(timeout)
    }

    pub async fn wait_async(&self, timeout: Duration) -> bool {
        self.graph.wait_async(timeout).await
    }

    /// Whether any execution unit of this run escalated an error so far.
    pub fn has_errors(&self) -> bool {
        self.scope.has_errors()
    }

    /// Drain the errors escalated by this run so far.
    pub fn take_errors(&self) -> Vec<TaskerError> {
        self.scope.take_errors()
    }

    /// Wait for quiescence, then surface the first escalated error.
    pub fn join(self, timeout: Duration) -> Result<()> {
        if !self.wait(timeout) {
            return Err(TaskerError::Timeout(timeout));
        }
        match self.take_errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
