use std::sync::{Arc, Mutex};

use tasker::events::{EventKind, EventSink, NodeEvent};

/// An event sink that records every notification in arrival order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<NodeEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NodeEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Kinds received for one node, in order.
    pub fn kinds_for(&self, node: &str) -> Vec<EventKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.node == node)
            .map(|e| e.kind)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: &NodeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
