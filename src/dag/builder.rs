// src/dag/builder.rs

//! Build phase of a graph: register nodes, wire guards, pick the execution
//! backend and event sink.
//!
//! Guards can only be added here, so a graph's topology can't change once
//! it has been run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::graph::Graph;
use crate::dag::guard::Guard;
use crate::dag::node::{Node, NodeId};
use crate::errors::{Result, TaskerError};
use crate::events::{EventSink, TracingSink};
use crate::exec::{Spawner, default_spawner};

pub struct GraphBuilder<C> {
    nodes: Vec<Node<C>>,
    index: HashMap<String, NodeId>,
    /// Edge direction: predecessor -> successor.
    edges: DiGraphMap<usize, ()>,
    spawner: Option<Arc<dyn Spawner>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl<C> fmt::Debug for GraphBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

impl<C: Send + Sync + 'static> Default for GraphBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Send + Sync + 'static> GraphBuilder<C> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: DiGraphMap::new(),
            spawner: None,
            sink: None,
        }
    }

    /// Use `spawner` to execute admitted nodes.
    ///
    /// Defaults to [`default_spawner`] at build time.
    pub fn spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Send lifecycle notifications to `sink` instead of the trace.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Register a node. Names must be unique.
    pub fn create<F>(&mut self, name: impl Into<String>, work: F) -> Result<NodeId>
    where
        F: Fn(&C) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(TaskerError::DuplicateName(name));
        }

        let id = NodeId::new(self.nodes.len());
        self.edges.add_node(id.index());
        self.index.insert(name.clone(), id);
        self.nodes.push(Node::new(id, name, Arc::new(work)));
        Ok(id)
    }

    /// Look up a registered node by name.
    pub fn resolve(&self, name: &str) -> Result<NodeId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| TaskerError::UnresolvedReference(name.to_string()))
    }

    /// Name of a registered node.
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id.index()).map(|n| n.name())
    }

    /// Make `successor` wait for `predecessor` to reach a terminal state.
    ///
    /// With `block_on_failure`, a failed predecessor keeps the successor
    /// closed for the rest of the run cycle. Rejects edges that would close a
    /// cycle.
    pub fn add_dependency(
        &mut self,
        predecessor: NodeId,
        successor: NodeId,
        block_on_failure: bool,
    ) -> Result<()> {
        let pred_name = self.checked_name(predecessor)?;
        let succ_name = self.checked_name(successor)?;

        if predecessor == successor
            || has_path_connecting(&self.edges, successor.index(), predecessor.index(), None)
        {
            return Err(TaskerError::CyclicDependency {
                predecessor: pred_name,
                successor: succ_name,
            });
        }

        self.edges
            .add_edge(predecessor.index(), successor.index(), ());
        self.nodes[successor.index()].push_guard(Guard::new(predecessor, block_on_failure));

        debug!(
            predecessor = %pred_name,
            successor = %succ_name,
            block_on_failure,
            "guard added"
        );
        Ok(())
    }

    /// `successor` runs after `predecessor` succeeds. Returns `successor` so
    /// chains read left to right.
    pub fn continue_with(&mut self, predecessor: NodeId, successor: NodeId) -> Result<NodeId> {
        self.add_dependency(predecessor, successor, true)?;
        Ok(successor)
    }

    /// Like [`continue_with`](Self::continue_with), resolving the successor
    /// by name.
    pub fn continue_with_named(&mut self, predecessor: NodeId, successor: &str) -> Result<NodeId> {
        let successor = self.resolve(successor)?;
        self.continue_with(predecessor, successor)
    }

    pub fn build(self) -> Graph<C> {
        let spawner = self.spawner.unwrap_or_else(default_spawner);
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        Graph::from_parts(self.nodes, self.index, spawner, sink)
    }

    fn checked_name(&self, id: NodeId) -> Result<String> {
        self.name_of(id)
            .map(str::to_string)
            .ok_or_else(|| TaskerError::UnresolvedReference(format!("#{}", id.index())))
    }
}
