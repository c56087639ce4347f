// src/events.rs

//! Lifecycle notifications emitted while nodes execute.
//!
//! For a single node the order is always `Started` followed by exactly one of
//! `Ended` or `Failed`. Nothing is promised about ordering across nodes.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Kind of lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Started,
    Ended,
    Failed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Started => "Started",
            EventKind::Ended => "Ended",
            EventKind::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// One lifecycle notification for one node.
#[derive(Debug, Clone)]
pub struct NodeEvent {
    pub kind: EventKind,
    pub node: String,
    /// Run in which the node was admitted.
    pub run_id: u64,
    pub at: DateTime<Utc>,
    /// Message of the raised error, for `Failed` events caused by one.
    pub error: Option<String>,
}

impl NodeEvent {
    pub fn new(kind: EventKind, node: &str, run_id: u64) -> Self {
        Self {
            kind,
            node: node.to_string(),
            run_id,
            at: Utc::now(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

impl fmt::Display for NodeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is {} at {}", self.node, self.kind, self.at.to_rfc3339())?;
        if let Some(ref err) = self.error {
            write!(f, ". {err}")?;
        }
        Ok(())
    }
}

/// Receiver of lifecycle notifications.
///
/// Called from whichever thread executes the node, so implementations must
/// be cheap and thread-safe.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &NodeEvent);
}

/// Default sink: writes every event to the `tracing` diagnostic trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event: &NodeEvent) {
        match event.kind {
            EventKind::Started | EventKind::Ended => info!(
                task = %event.node,
                run_id = event.run_id,
                kind = %event.kind,
                "{event}"
            ),
            EventKind::Failed => warn!(
                task = %event.node,
                run_id = event.run_id,
                kind = %event.kind,
                error = event.error.as_deref().unwrap_or(""),
                "{event}"
            ),
        }
    }
}
