//! In-memory backend for tests.
//!
//! [`ScriptedTransport`] answers each endpoint from a script and counts the
//! calls it receives. History scripts are per job id; the last step of a
//! script repeats once it is reached.

use crate::error::TransportError;
use crate::payload::Payload;
use crate::transport::BackendTransport;
use async_trait::async_trait;
use comfy_relay_core::JobId;
use serde_json::{Value as JsonValue, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted endpoint response.
pub type Step = Result<JsonValue, TransportError>;

/// Number of calls received per endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Job submissions.
    pub prompt: usize,
    /// History queries.
    pub history: usize,
    /// Queue queries.
    pub queue: usize,
    /// Health probes.
    pub root: usize,
}

impl CallCounts {
    /// Total calls across all endpoints.
    #[must_use]
    pub fn total(&self) -> usize {
        self.prompt + self.history + self.queue + self.root
    }
}

#[derive(Debug)]
struct Script {
    prompts: VecDeque<Step>,
    histories: HashMap<String, VecDeque<Step>>,
    queue: Step,
    root: Result<u16, TransportError>,
    latency: Duration,
    submitted: Vec<Payload>,
    calls: CallCounts,
}

/// Scripted stand-in for the generation backend.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Creates a reachable backend with an empty queue and no jobs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                prompts: VecDeque::new(),
                histories: HashMap::new(),
                queue: Ok(json!({"queue_running": [], "queue_pending": []})),
                root: Ok(200),
                latency: Duration::ZERO,
                submitted: Vec::new(),
                calls: CallCounts::default(),
            })),
        }
    }

    fn edit(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.script.lock().unwrap());
        self
    }

    /// Queues a successful submission that assigns `job_id`.
    #[must_use]
    pub fn accept_prompt(self, job_id: &str) -> Self {
        self.respond_to_prompt(json!({"prompt_id": job_id, "number": 0, "node_errors": {}}))
    }

    /// Queues a raw submission response.
    #[must_use]
    pub fn respond_to_prompt(self, body: JsonValue) -> Self {
        self.edit(|s| s.prompts.push_back(Ok(body)))
    }

    /// Queues a failed submission.
    #[must_use]
    pub fn reject_prompt(self, error: TransportError) -> Self {
        self.edit(|s| s.prompts.push_back(Err(error)))
    }

    /// Scripts the history responses for one job.
    #[must_use]
    pub fn script_history(self, job_id: &str, steps: Vec<Step>) -> Self {
        self.edit(|s| {
            s.histories.insert(job_id.to_string(), steps.into());
        })
    }

    /// Sets the queue response.
    #[must_use]
    pub fn with_queue(self, response: Step) -> Self {
        self.edit(|s| s.queue = response)
    }

    /// Sets the status the root endpoint answers with.
    #[must_use]
    pub fn with_root_status(self, status: u16) -> Self {
        self.edit(|s| s.root = Ok(status))
    }

    /// Makes the root probe fail as if the backend were down.
    #[must_use]
    pub fn unreachable(self) -> Self {
        self.edit(|s| s.root = Err(transient()))
    }

    /// Delays every history response.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.edit(|s| s.latency = latency)
    }

    /// Returns the calls received so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.script.lock().unwrap().calls
    }

    /// Returns the payloads submitted so far.
    #[must_use]
    pub fn submitted(&self) -> Vec<Payload> {
        self.script.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl BackendTransport for ScriptedTransport {
    async fn post_prompt(&self, payload: &Payload) -> Result<JsonValue, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.calls.prompt += 1;
        script.submitted.push(payload.clone());
        script.prompts.pop_front().unwrap_or_else(|| {
            Err(TransportError::Status {
                status: 500,
                body: "no scripted submission".to_string(),
            })
        })
    }

    async fn get_history(&self, job_id: &JobId) -> Result<JsonValue, TransportError> {
        let (step, latency) = {
            let mut script = self.script.lock().unwrap();
            script.calls.history += 1;
            let step = match script.histories.get_mut(job_id.as_str()) {
                Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
                Some(steps) => steps.front().cloned().unwrap_or_else(|| Ok(json!({}))),
                None => Ok(json!({})),
            };
            (step, script.latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        step
    }

    async fn get_queue(&self) -> Result<JsonValue, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.calls.queue += 1;
        script.queue.clone()
    }

    async fn get_root(&self) -> Result<u16, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.calls.root += 1;
        script.root.clone()
    }
}

/// A connection-reset style failure.
#[must_use]
pub fn transient() -> TransportError {
    TransportError::Transient {
        reason: "connection reset by peer".to_string(),
    }
}

/// History response for a job the backend has not started.
#[must_use]
pub fn pending_history() -> JsonValue {
    json!({})
}

/// History response for a job in progress.
#[must_use]
pub fn running_history(job_id: &str) -> JsonValue {
    json!({ job_id: {"status": {"completed": false, "messages": []}, "outputs": {}} })
}

/// History response for a finished job.
#[must_use]
pub fn completed_history(job_id: &str, outputs: JsonValue) -> JsonValue {
    json!({
        job_id: {
            "status": {"status_str": "success", "completed": true, "messages": []},
            "outputs": outputs,
        }
    })
}

/// History response for a job the backend reports as failed.
#[must_use]
pub fn errored_history(job_id: &str, error: &str) -> JsonValue {
    json!({
        job_id: {
            "status": {"status_str": "error", "completed": false, "error": error},
            "outputs": {},
        }
    })
}
