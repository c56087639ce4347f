// src/dag/guard.rs

//! Directed gate between a predecessor node and one successor.

use crate::dag::node::{Node, NodeId, NodeState};

/// Incoming edge of a node.
///
/// A guard only remembers *which* node it waits on (as an index into the
/// owning graph's node table) and whether a failed predecessor should keep
/// the successor closed. It is never mutated after the graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    predecessor: NodeId,
    block_on_failure: bool,
}

impl Guard {
    pub fn new(predecessor: NodeId, block_on_failure: bool) -> Self {
        Self {
            predecessor,
            block_on_failure,
        }
    }

    pub fn predecessor(&self) -> NodeId {
        self.predecessor
    }

    pub fn blocks_on_failure(&self) -> bool {
        self.block_on_failure
    }

    /// Decide against an observed predecessor state.
    ///
    /// - not terminal: closed
    /// - `Succeeded`: open
    /// - `Failed`: open only when the guard does not block on failure
    pub fn evaluate_state(&self, predecessor: NodeState) -> bool {
        match predecessor {
            NodeState::Idle | NodeState::Launched => false,
            NodeState::Succeeded => true,
            NodeState::Failed => !self.block_on_failure,
        }
    }

    /// Evaluate against the live state of the predecessor in `nodes`.
    pub(crate) fn evaluate<C>(&self, nodes: &[Node<C>]) -> bool {
        match nodes.get(self.predecessor.index()) {
            Some(node) => self.evaluate_state(node.state()),
            None => false,
        }
    }
}
