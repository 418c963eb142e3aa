use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::cardinality::Cardinality;

/// A structural mutation requested by UI chrome.
///
/// Node and edge components never hold a reference to the owning graph;
/// they emit one of these through an [`EventSink`] and the diagram owner
/// decides whether and how to commit it. Emitting an event never mutates
/// the node/edge data handed to the component.
///
/// The serialized form matches the DOM-level signal contract of the editor
/// (`{"event": "diagram:node-delete", "detail": {"id": "..."}}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "detail")]
pub enum CanvasEvent {
    #[serde(rename = "diagram:node-delete")]
    NodeDelete { id: String },
    /// Open or close the node's inspector/settings panel.
    #[serde(rename = "diagram:node-toggle")]
    NodeToggle { id: String },
    /// Remove the node from its group.
    #[serde(rename = "diagram:node-detach")]
    NodeDetach { id: String },
    #[serde(rename = "diagram:node-duplicate")]
    NodeDuplicate { id: String },
    #[serde(rename = "diagram:edge-label-change")]
    EdgeLabelChange {
        id: String,
        label: Option<String>,
        #[serde(rename = "hasLabel")]
        has_label: bool,
    },
    #[serde(rename = "diagram:edge-cardinality-change")]
    EdgeCardinalityChange { id: String, cardinality: Cardinality },
}

impl CanvasEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            CanvasEvent::NodeDelete { .. } => "diagram:node-delete",
            CanvasEvent::NodeToggle { .. } => "diagram:node-toggle",
            CanvasEvent::NodeDetach { .. } => "diagram:node-detach",
            CanvasEvent::NodeDuplicate { .. } => "diagram:node-duplicate",
            CanvasEvent::EdgeLabelChange { .. } => "diagram:edge-label-change",
            CanvasEvent::EdgeCardinalityChange { .. } => "diagram:edge-cardinality-change",
        }
    }
}

/// Where components send their mutation requests. Injected at construction
/// instead of dispatched through ambient global state, so tests need no
/// listener setup or teardown. `emit` takes `&self`: a sink can queue or
/// forward, but it cannot reach back into the caller's graph.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CanvasEvent);
}

/// Sink that records every event, for tests and for draining into an owner.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CanvasEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<CanvasEvent> {
        std::mem::take(&mut self.events.lock().expect("sink poisoned"))
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().expect("sink poisoned").is_empty()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: CanvasEvent) {
        self.events.lock().expect("sink poisoned").push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_preserves_order() {
        let sink = RecordingSink::new();
        sink.emit(CanvasEvent::NodeDelete {
            id: "a".to_string(),
        });
        sink.emit(CanvasEvent::NodeToggle {
            id: "b".to_string(),
        });

        let events = sink.take();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_name(), "diagram:node-delete");
        assert_eq!(events[1].event_name(), "diagram:node-toggle");
        assert!(sink.is_empty());
    }

    #[test]
    fn wire_shape_matches_dom_contract() {
        let event = CanvasEvent::EdgeLabelChange {
            id: "e1".to_string(),
            label: Some("reads".to_string()),
            has_label: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "diagram:edge-label-change");
        assert_eq!(json["detail"]["id"], "e1");
        assert_eq!(json["detail"]["hasLabel"], true);

        let back: CanvasEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn cardinality_change_round_trips() {
        let raw = r#"{"event":"diagram:edge-cardinality-change","detail":{"id":"e2","cardinality":"many-to-many"}}"#;
        let event: CanvasEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            CanvasEvent::EdgeCardinalityChange {
                id: "e2".to_string(),
                cardinality: Cardinality::ManyToMany,
            }
        );
    }
}
