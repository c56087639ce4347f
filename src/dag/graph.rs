// src/dag/graph.rs

//! The executor: owns every node, runs admission sweeps and exposes
//! run / wait / reset.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, error, info, warn};

use crate::dag::builder::GraphBuilder;
use crate::dag::counter::RunCounters;
use crate::dag::node::{Node, NodeId, NodeState, Outcome};
use crate::dag::run::{RunHandle, RunOptions, RunScope};
use crate::errors::Result;
use crate::events::{EventKind, EventSink, NodeEvent};
use crate::exec::Spawner;

pub(crate) struct GraphInner<C> {
    nodes: Vec<Node<C>>,
    index: HashMap<String, NodeId>,
    counters: RunCounters,
    spawner: Arc<dyn Spawner>,
    sink: Arc<dyn EventSink>,
    next_run_id: AtomicU64,
}

/// A built task graph.
///
/// Cloning is cheap and every clone drives the same nodes. The topology is
/// frozen at [`GraphBuilder::build`]; only node states change afterwards.
pub struct Graph<C> {
    inner: Arc<GraphInner<C>>,
}

impl<C> Clone for Graph<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for Graph<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.inner.nodes)
            .field("running", &self.inner.counters.is_running())
            .finish_non_exhaustive()
    }
}

impl<C: Send + Sync + 'static> Graph<C> {
    pub fn builder() -> GraphBuilder<C> {
        GraphBuilder::new()
    }

    pub(crate) fn from_parts(
        nodes: Vec<Node<C>>,
        index: HashMap<String, NodeId>,
        spawner: Arc<dyn Spawner>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let counters = RunCounters::new(nodes.iter().map(|n| n.name().to_string()));
        Self {
            inner: Arc::new(GraphInner {
                nodes,
                index,
                counters,
                spawner,
                sink,
                next_run_id: AtomicU64::new(1),
            }),
        }
    }

    /// Start a run that escalates raised errors.
    pub fn run(&self, context: impl Into<Arc<C>>) -> RunHandle<C> {
        self.run_with(context, RunOptions::default())
    }

    /// Start a run with explicit options.
    ///
    /// Performs one admission sweep on the calling thread and returns
    /// immediately; admitted nodes execute on the graph's spawner.
    pub fn run_with(&self, context: impl Into<Arc<C>>, options: RunOptions) -> RunHandle<C> {
        let run_id = self.inner.next_run_id.fetch_add(1, Ordering::Relaxed);
        let scope = Arc::new(RunScope::new(run_id, context.into(), options));

        info!(
            run_id,
            continue_on_error = options.continue_on_error,
            tasks = self.inner.nodes.len(),
            "starting graph run"
        );

        self.sweep(&scope);
        RunHandle::new(self.clone(), scope)
    }

    /// Block until nothing is running or `timeout` elapses.
    ///
    /// Returns `true` when the graph is quiet. Never cancels in-flight work
    /// and never reports errors; check [`is_failed`](Self::is_failed).
    pub fn wait(&self, timeout: Duration) -> bool {
        let quiet = self.inner.counters.wait_idle(timeout);
        if !quiet {
            debug!(?timeout, "wait timed out with tasks still running");
        }
        quiet
    }

    pub async fn wait_async(&self, timeout: Duration) -> bool {
        self.inner.counters.wait_idle_async(timeout).await
    }

    /// `true` iff at least one per-name counter is positive.
    pub fn is_running(&self) -> bool {
        self.inner.counters.is_running()
    }

    /// `true` iff a node that has reached a terminal state ended `Failed`.
    ///
    /// Nodes that are idle or still launched do not count.
    pub fn is_failed(&self) -> bool {
        self.inner
            .nodes
            .iter()
            .any(|n| n.state() == NodeState::Failed)
    }

    /// Reopen every `Failed` node. `Succeeded` nodes stay terminal.
    ///
    /// Returns how many nodes were reopened.
    pub fn reset(&self) -> usize {
        if self.is_running() {
            warn!("reset called while tasks are still running");
        }

        let reopened = self.inner.nodes.iter().filter(|n| n.reset()).count();

        if reopened > 0 {
            info!(reopened, "reset failed tasks to idle");
        } else {
            debug!("reset: no failed tasks");
        }
        reopened
    }

    pub fn len(&self) -> usize {
        self.inner.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.nodes.is_empty()
    }

    /// Node names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.nodes.iter().map(|n| n.name())
    }

    pub fn state_of(&self, name: &str) -> Option<NodeState> {
        self.node(name).map(|n| n.state())
    }

    /// Message of the last error raised by the node's work, if any.
    pub fn last_error_of(&self, name: &str) -> Option<String> {
        self.node(name).and_then(|n| n.last_error())
    }

    /// In-flight executions recorded for `name`.
    pub fn running_count(&self, name: &str) -> Option<usize> {
        self.inner.counters.get(name).map(|c| c.value())
    }

    /// Predecessors of `name` with their block-on-failure flag.
    pub fn dependencies_of(&self, name: &str) -> Vec<(&str, bool)> {
        let Some(node) = self.node(name) else {
            return Vec::new();
        };
        node.guards()
            .iter()
            .filter_map(|g| {
                self.inner
                    .nodes
                    .get(g.predecessor().index())
                    .map(|p| (p.name(), g.blocks_on_failure()))
            })
            .collect()
    }

    /// Names of nodes that have not reached a terminal state.
    pub fn unfinished(&self) -> Vec<&str> {
        self.names_where(|s| !s.is_terminal())
    }

    /// Names of nodes currently `Failed`.
    pub fn failed(&self) -> Vec<&str> {
        self.names_where(|s| s == NodeState::Failed)
    }

    fn names_where(&self, pred: impl Fn(NodeState) -> bool) -> Vec<&str> {
        self.inner
            .nodes
            .iter()
            .filter(|n| pred(n.state()))
            .map(|n| n.name())
            .collect()
    }

    fn node(&self, name: &str) -> Option<&Node<C>> {
        let id = self.inner.index.get(name)?;
        self.inner.nodes.get(id.index())
    }

    /// Offer admission to every node.
    fn sweep(&self, scope: &Arc<RunScope<C>>) {
        for node in &self.inner.nodes {
            self.admit(node.id(), scope);
        }
    }

    fn admit(&self, id: NodeId, scope: &Arc<RunScope<C>>) {
        let inner = &self.inner;
        let node = &inner.nodes[id.index()];

        if !node.try_admit(&inner.nodes) {
            return;
        }

        debug!(
            task = %node.name(),
            run_id = scope.run_id(),
            "guards satisfied; task launched"
        );
        inner.counters.start(node.name());

        let handoff = Arc::new(AtomicU8::new(HANDOFF_SPAWNING));
        let launch = Launch {
            graph: self.clone(),
            id,
            scope: Arc::clone(scope),
            handoff: Arc::clone(&handoff),
            armed: true,
        };
        let spawned = inner
            .spawner
            .spawn(node.name(), Box::new(move || launch.run()));

        match spawned {
            Ok(()) => {
                if handoff
                    .compare_exchange(
                        HANDOFF_SPAWNING,
                        HANDOFF_DONE,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_err()
                {
                    // The spawner accepted the job but dropped it before
                    // returning.
                    warn!(task = %node.name(), "spawner dropped the job without running it");
                    self.abandon(id, scope, anyhow!(DROPPED_JOB));
                }
            }
            Err(err) => {
                handoff.store(HANDOFF_REFUSED, Ordering::SeqCst);
                error!(task = %node.name(), error = %err, "could not start task");
                self.abandon(id, scope, anyhow::Error::new(err));
            }
        }
    }

    /// Settle a launched node whose work never ran, as a raised failure.
    fn abandon(&self, id: NodeId, scope: &Arc<RunScope<C>>, error: anyhow::Error) {
        let inner = &self.inner;
        let node = &inner.nodes[id.index()];

        // Keep the Started/terminal pairing even though no work ran.
        inner.sink.on_event(&NodeEvent::new(
            EventKind::Started,
            node.name(),
            scope.run_id(),
        ));
        let result = node.settle(Outcome::Raised(error), scope, inner.sink.as_ref());
        self.complete(id, result, scope);
    }

    /// Body of one execution unit.
    fn execute(&self, id: NodeId, scope: &Arc<RunScope<C>>) {
        let node = &self.inner.nodes[id.index()];
        let result = node.execute(scope, self.inner.sink.as_ref());
        self.complete(id, result, scope);
    }

    /// Follow-up after a node settled: sweep for newly eligible successors
    /// (unless the failure was escalated), then release the node's counter.
    ///
    /// The sweep runs before the release so the graph never looks idle
    /// while a successor is about to be admitted.
    fn complete(&self, id: NodeId, result: Result<()>, scope: &Arc<RunScope<C>>) {
        let node = &self.inner.nodes[id.index()];

        match result {
            Ok(()) => self.sweep(scope),
            Err(err) => {
                error!(
                    task = %node.name(),
                    run_id = scope.run_id(),
                    error = %err,
                    "task error escalated; this branch stops driving the run"
                );
                scope.record(err);
            }
        }

        self.inner.counters.stop(node.name());
    }
}

const DROPPED_JOB: &str = "job dropped by spawner";

// Handoff of a launch to the spawner.
const HANDOFF_SPAWNING: u8 = 0;
const HANDOFF_DONE: u8 = 1;
const HANDOFF_DROPPED: u8 = 2;
const HANDOFF_REFUSED: u8 = 3;

/// One admitted node travelling through the spawner.
///
/// If the job is dropped without running (runtime shut down, spawner
/// discarded it), the node is still settled and its counter released.
struct Launch<C: Send + Sync + 'static> {
    graph: Graph<C>,
    id: NodeId,
    scope: Arc<RunScope<C>>,
    handoff: Arc<AtomicU8>,
    armed: bool,
}

impl<C: Send + Sync + 'static> Launch<C> {
    fn run(mut self) {
        self.armed = false;
        self.graph.execute(self.id, &self.scope);
    }
}

impl<C: Send + Sync + 'static> Drop for Launch<C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.handoff.compare_exchange(
            HANDOFF_SPAWNING,
            HANDOFF_DROPPED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            // Still inside `Spawner::spawn`; `admit` settles once it returns.
            Ok(_) => {}
            Err(HANDOFF_DONE) => {
                warn!(
                    task = %self.graph.inner.nodes[self.id.index()].name(),
                    "spawner dropped the job without running it"
                );
                self.graph
                    .abandon(self.id, &self.scope, anyhow!(DROPPED_JOB));
            }
            // Refused: `admit` already settled the node.
            Err(_) => {}
        }
    }
}
