//! Opaque job payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A backend job graph, keyed by node id.
///
/// The client never inspects the graph; it is built once per request and
/// only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, JsonValue>);

impl Payload {
    /// Wraps a node-id keyed graph.
    #[must_use]
    pub fn new(graph: Map<String, JsonValue>) -> Self {
        Self(graph)
    }

    /// Returns the graph.
    #[must_use]
    pub fn graph(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    /// Returns the node with the given id, if present.
    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&JsonValue> {
        self.0.get(node_id)
    }

    /// Returns the request body for the backend's job-intake endpoint.
    #[must_use]
    pub fn to_request_body(&self) -> JsonValue {
        serde_json::json!({ "prompt": self.0 })
    }
}
