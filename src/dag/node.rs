// src/dag/node.rs

//! A schedulable unit of work and its admission/execution protocol.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::dag::guard::Guard;
use crate::dag::run::RunScope;
use crate::errors::{Result, TaskerError};
use crate::events::{EventKind, EventSink, NodeEvent};

/// Work function attached to a node.
///
/// `Ok(true)` means success, `Ok(false)` an outcome failure, `Err(_)` a
/// raised failure.
pub type WorkFn<C> = Arc<dyn Fn(&C) -> anyhow::Result<bool> + Send + Sync>;

/// Index of a node inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Lifecycle state of a node.
///
/// `Idle -> Launched -> {Succeeded | Failed}`, and `Failed -> Idle` only via
/// an explicit reset. `Succeeded` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeState {
    Idle = 0,
    Launched = 1,
    Succeeded = 2,
    Failed = 3,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Succeeded | NodeState::Failed)
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => NodeState::Idle,
            1 => NodeState::Launched,
            2 => NodeState::Succeeded,
            _ => NodeState::Failed,
        }
    }
}

/// What a single invocation of the work function produced.
pub(crate) enum Outcome {
    Succeeded,
    /// Work returned `false`.
    Failed,
    /// Work returned an error or panicked.
    Raised(anyhow::Error),
}

pub(crate) struct Node<C> {
    id: NodeId,
    name: String,
    work: WorkFn<C>,
    /// Every access is `SeqCst`: two predecessors of a join each store their
    /// own terminal state and then read the other's, and at least one of
    /// them must observe both.
    state: AtomicU8,
    guards: Vec<Guard>,
    last_error: Mutex<Option<String>>,
}

impl<C> fmt::Debug for Node<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("guards", &self.guards)
            .finish_non_exhaustive()
    }
}

impl<C> Node<C> {
    pub(crate) fn new(id: NodeId, name: String, work: WorkFn<C>) -> Self {
        Self {
            id,
            name,
            work,
            state: AtomicU8::new(NodeState::Idle as u8),
            guards: Vec::new(),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub(crate) fn push_guard(&mut self, guard: Guard) {
        self.guards.push(guard);
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// AND of every incoming guard; an empty guard set passes.
    pub(crate) fn guards_pass(&self, nodes: &[Node<C>]) -> bool {
        self.guards.iter().all(|g| g.evaluate(nodes))
    }

    /// Try to move this node from `Idle` to `Launched`.
    ///
    /// Any number of threads may call this concurrently; at most one of them
    /// gets `true` per run cycle. The cheap state check runs first so that
    /// launched and terminal nodes never re-evaluate their guards.
    pub(crate) fn try_admit(&self, nodes: &[Node<C>]) -> bool {
        if self.state() != NodeState::Idle {
            return false;
        }
        if !self.guards_pass(nodes) {
            return false;
        }
        self.state
            .compare_exchange(
                NodeState::Idle as u8,
                NodeState::Launched as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Reopen a failed node. Returns `true` if the node was `Failed`.
    pub(crate) fn reset(&self) -> bool {
        let reopened = self
            .state
            .compare_exchange(
                NodeState::Failed as u8,
                NodeState::Idle as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if reopened {
            *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
        reopened
    }

    /// Execution body of a launched node.
    ///
    /// Emits `Started`, runs the work with the run's context and settles the
    /// node. An `Err` means the failure was escalated and the caller must not
    /// continue the run from this unit.
    pub(crate) fn execute(&self, scope: &RunScope<C>, sink: &dyn EventSink) -> Result<()> {
        sink.on_event(&NodeEvent::new(EventKind::Started, &self.name, scope.run_id()));
        debug!(task = %self.name, run_id = scope.run_id(), "invoking work function");

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| (self.work)(scope.context()))) {
            Ok(Ok(true)) => Outcome::Succeeded,
            Ok(Ok(false)) => Outcome::Failed,
            Ok(Err(err)) => Outcome::Raised(err),
            Err(payload) => Outcome::Raised(anyhow!("work panicked: {}", panic_message(payload.as_ref()))),
        };

        self.settle(outcome, scope, sink)
    }

    /// Record the terminal state for `outcome` and notify the sink.
    pub(crate) fn settle(
        &self,
        outcome: Outcome,
        scope: &RunScope<C>,
        sink: &dyn EventSink,
    ) -> Result<()> {
        let run_id = scope.run_id();

        match outcome {
            Outcome::Succeeded => {
                self.finish(NodeState::Succeeded);
                debug!(task = %self.name, run_id, "task succeeded");
                sink.on_event(&NodeEvent::new(EventKind::Ended, &self.name, run_id));
                Ok(())
            }
            Outcome::Failed => {
                self.finish(NodeState::Failed);
                debug!(task = %self.name, run_id, "task returned a failed outcome");
                sink.on_event(&NodeEvent::new(EventKind::Failed, &self.name, run_id));
                Ok(())
            }
            Outcome::Raised(error) => {
                let message = format!("{error:#}");
                *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(message.clone());
                self.finish(NodeState::Failed);
                sink.on_event(
                    &NodeEvent::new(EventKind::Failed, &self.name, run_id).with_error(message),
                );

                if scope.options().continue_on_error {
                    warn!(
                        task = %self.name,
                        run_id,
                        error = %error,
                        "task raised an error; continuing run"
                    );
                    Ok(())
                } else {
                    Err(TaskerError::Task {
                        node: self.name.clone(),
                        error,
                    })
                }
            }
        }
    }

    fn finish(&self, state: NodeState) {
        let prev = self.state.swap(state as u8, Ordering::SeqCst);
        if prev != NodeState::Launched as u8 {
            warn!(
                task = %self.name,
                previous = ?NodeState::from_u8(prev),
                "task settled from a state other than Launched"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
