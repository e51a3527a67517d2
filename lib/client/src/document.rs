//! Backend result documents and the outputs extracted from them.
//!
//! A history response maps job ids to records:
//!
//! ```json
//! {
//!   "<job_id>": {
//!     "status": { "completed": true, "status_str": "success" },
//!     "outputs": { "9": { "images": [{ "filename": "a.png", "subfolder": "" }] } }
//!   }
//! }
//! ```
//!
//! Node and media ordering follows the document, which relies on
//! `serde_json`'s `preserve_order` feature.

use crate::job::JobStatus;
use comfy_relay_core::{JobId, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Backend queue snapshot, passed through verbatim.
pub type QueueInfo = JsonValue;

/// The backend's record for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    /// Execution status.
    #[serde(default)]
    pub status: RecordStatus,
    /// Per-node outputs, keyed by node id in document order.
    #[serde(default)]
    pub outputs: Map<String, JsonValue>,
    /// Remaining fields (the submitted prompt, metadata), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl ResultDocument {
    /// Finds the record for `job_id` in a history response.
    ///
    /// Returns `Ok(None)` when the backend has no record for the job yet.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error if the record is malformed.
    pub fn from_history(
        history: &JsonValue,
        job_id: &JobId,
    ) -> Result<Option<Self>, serde_json::Error> {
        match history.get(job_id.as_str()) {
            Some(record) => Self::deserialize(record).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the job status this record represents.
    #[must_use]
    pub fn observed_status(&self) -> JobStatus {
        self.status.observed()
    }
}

/// Status section of a result document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordStatus {
    /// Whether the backend finished the job.
    #[serde(default)]
    pub completed: bool,
    /// Explicit error detail, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonValue>,
    /// Backend status label (`success`, `error`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_str: Option<String>,
    /// Execution event log as `[event_name, data]` pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<JsonValue>,
}

impl RecordStatus {
    /// Maps the record onto the job state machine.
    ///
    /// Completion wins over an error marker, matching the order the backend
    /// sets them in.
    #[must_use]
    pub fn observed(&self) -> JobStatus {
        if self.completed {
            JobStatus::Completed
        } else if self.error_detail().is_some() {
            JobStatus::Errored
        } else {
            JobStatus::Running
        }
    }

    /// Returns a human-readable error detail if the backend reported a failure.
    #[must_use]
    pub fn error_detail(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(match error {
                JsonValue::String(message) => message.clone(),
                other => other.to_string(),
            });
        }
        if self.status_str.as_deref() == Some("error") {
            return Some(
                self.execution_error()
                    .unwrap_or_else(|| "backend reported status 'error'".to_string()),
            );
        }
        None
    }

    fn execution_error(&self) -> Option<String> {
        let data = self.messages.iter().find_map(|message| {
            let pair = message.as_array()?;
            (pair.first()?.as_str()? == "execution_error").then(|| pair.get(1))?
        })?;
        let exception = data.get("exception_message")?.as_str()?.trim();
        match (
            data.get("node_id").and_then(JsonValue::as_str),
            data.get("node_type").and_then(JsonValue::as_str),
        ) {
            (Some(node_id), Some(node_type)) => {
                Some(format!("node {node_id} ({node_type}): {exception}"))
            }
            (Some(node_id), None) => Some(format!("node {node_id}: {exception}")),
            _ => Some(exception.to_string()),
        }
    }
}

/// Kind of media an output refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Image,
    Video,
    Audio,
}

impl OutputKind {
    /// Maps a per-node output key to a media kind.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "images" => Some(Self::Image),
            "videos" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Returns the wire label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A produced artifact reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Media kind.
    #[serde(rename = "type")]
    pub kind: OutputKind,
    /// File name on the backend.
    pub filename: String,
    /// Subfolder under the backend's output directory, possibly empty.
    pub subfolder: String,
    /// Node of the payload graph that produced the file.
    #[serde(rename = "node_id")]
    pub producing_node_id: NodeId,
}

/// Collects output references from a result document.
///
/// Walks nodes, then media keys, then entries, all in document order.
/// Unknown media keys and entries without a file name are skipped.
#[must_use]
pub fn extract_outputs(document: &ResultDocument) -> Vec<Output> {
    let mut outputs = Vec::new();

    for (node_id, node_outputs) in &document.outputs {
        let Some(sections) = node_outputs.as_object() else {
            continue;
        };
        for (key, entries) in sections {
            let Some(kind) = OutputKind::from_key(key) else {
                continue;
            };
            let Some(entries) = entries.as_array() else {
                continue;
            };
            for entry in entries {
                let Some(filename) = entry.get("filename").and_then(JsonValue::as_str) else {
                    continue;
                };
                outputs.push(Output {
                    kind,
                    filename: filename.to_string(),
                    subfolder: entry
                        .get("subfolder")
                        .and_then(JsonValue::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    producing_node_id: NodeId::new(node_id.clone()),
                });
            }
        }
    }

    outputs
}
