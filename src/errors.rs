// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskerError {
    /// A node with this name is already registered in the graph.
    #[error("Duplicate task name: {0}")]
    DuplicateName(String),

    /// Name-based wiring referenced a node that does not exist.
    #[error("Task node '{0}' can't be resolved")]
    UnresolvedReference(String),

    /// Adding the edge `predecessor -> successor` would close a cycle.
    #[error("Cyclic dependency: '{successor}' already leads back to '{predecessor}'")]
    CyclicDependency {
        predecessor: String,
        successor: String,
    },

    /// A work function raised an error while the run was not configured to
    /// continue on error.
    #[error("task '{node}' failed: {error:#}")]
    Task { node: String, error: anyhow::Error },

    /// The execution backend refused to start a node.
    #[error("failed to spawn task '{node}': {reason}")]
    Spawn { node: String, reason: String },

    /// A run was still in flight when the caller stopped waiting.
    #[error("run still in progress after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskerError {
    /// Name of the node this error is attached to, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            TaskerError::Task { node, .. } | TaskerError::Spawn { node, .. } => Some(node),
            TaskerError::DuplicateName(name) | TaskerError::UnresolvedReference(name) => Some(name),
            TaskerError::CyclicDependency { successor, .. } => Some(successor),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskerError>;
