// src/dag/mod.rs

//! DAG representation and execution.
//!
//! - [`guard`] is the gate between a predecessor and a successor.
//! - [`node`] holds a unit of work, its state and the admission protocol.
//! - [`counter`] tracks in-flight executions per node name.
//! - [`builder`] registers nodes and wires guards.
//! - [`graph`] runs admission sweeps and exposes run / wait / reset.
//! - [`run`] carries the run-scoped context and error policy.

pub mod builder;
pub mod counter;
pub mod graph;
pub mod guard;
pub mod node;
pub mod run;

pub use builder::GraphBuilder;
pub use counter::RunCounter;
pub use graph::Graph;
pub use guard::Guard;
pub use node::{NodeId, NodeState, WorkFn};
pub use run::{RunHandle, RunOptions};
