// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the [`Spawner`] trait the graph dispatches admitted
//!   nodes through, with tokio and OS-thread implementations.
//! - [`command`] turns workflow tasks into shell-command work functions.

pub mod backend;
pub mod command;

pub use backend::{Job, Spawner, ThreadSpawner, TokioSpawner, default_spawner};
pub use command::{CommandContext, graph_from_config, shell_work};
