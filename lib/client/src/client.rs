//! The job client.
//!
//! Manages the lifecycle of submitted jobs against the backend and hides the
//! retry and timeout policy from callers.

use crate::document::{self, Output, QueueInfo, ResultDocument};
use crate::error::{ClientError, TransportError};
use crate::job::{Job, JobStatus};
use crate::payload::Payload;
use crate::transport::{BackendTransport, HttpTransport, RequestTimeouts};
use comfy_relay_core::{JobId, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Polling cadence and retry limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay after a check that found the job still pending or running.
    pub poll_interval: Duration,
    /// Delay after a transient transport failure.
    pub retry_backoff: Duration,
    /// Consecutive transient failures tolerated before giving up.
    /// `None` bounds retries only by the job timeout.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(2),
            max_consecutive_failures: None,
        }
    }
}

/// Configuration for an HTTP-backed [`JobClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `http://127.0.0.1:8188`.
    pub base_url: String,
    /// Per-request timeouts.
    pub timeouts: RequestTimeouts,
    /// Poll loop policy.
    pub poll: PollPolicy,
}

impl ClientConfig {
    /// Creates a configuration with default timeouts and policy.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeouts: RequestTimeouts::default(),
            poll: PollPolicy::default(),
        }
    }
}

#[derive(Deserialize)]
struct PromptResponse {
    prompt_id: String,
}

/// Client for submitting and tracking backend jobs.
///
/// Immutable once constructed; clones share the transport.
pub struct JobClient<T: BackendTransport> {
    transport: Arc<T>,
    policy: PollPolicy,
}

impl<T: BackendTransport> Clone for JobClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            policy: self.policy,
        }
    }
}

impl JobClient<HttpTransport> {
    /// Creates a client that talks HTTP to the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(config.base_url.clone(), config.timeouts)
            .map_err(ClientError::from)?;
        Ok(Self::new(transport, config.poll))
    }
}

impl<T: BackendTransport> JobClient<T> {
    /// Creates a client over the given transport.
    pub fn new(transport: T, policy: PollPolicy) -> Self {
        Self {
            transport: Arc::new(transport),
            policy,
        }
    }

    /// Returns the poll policy.
    #[must_use]
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Submits a payload to the backend's job intake.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend is unreachable, rejects the
    /// payload, or answers without a job id. The backend's response excerpt is
    /// included where available.
    #[instrument(skip_all)]
    pub async fn submit(&self, payload: &Payload) -> Result<Job, ClientError> {
        let response = self.transport.post_prompt(payload).await.map_err(|e| {
            warn!(error = %e, "backend rejected submission");
            ClientError::from(e)
        })?;

        let PromptResponse { prompt_id } =
            PromptResponse::deserialize(&response).map_err(|e| {
                ClientError::BackendUnavailable {
                    reason: format!("submission response without prompt_id: {e}"),
                }
            })?;

        let job_id: JobId = prompt_id
            .parse()
            .map_err(|e: comfy_relay_core::ParseIdError| ClientError::BackendUnavailable {
                reason: e.to_string(),
            })?;

        info!(job_id = %job_id, "job submitted");
        Ok(Job::submitted(job_id))
    }

    /// Polls the backend until the job completes, fails, or `timeout` elapses.
    ///
    /// The job's status is updated as the backend's answers are observed.
    /// Transient transport failures are retried after the backoff and are
    /// never surfaced on their own.
    ///
    /// # Errors
    ///
    /// - `BackendJobError` if the backend reports a job error, or gives a
    ///   definitive non-success answer such as 404 for an unknown id
    /// - `Timeout` if the budget is exhausted first
    /// - `BackendUnavailable` if `max_consecutive_failures` is configured and
    ///   exceeded
    #[instrument(skip(self, job), fields(job_id = %job.id()))]
    pub async fn poll_until_done(
        &self,
        job: &mut Job,
        timeout: Duration,
    ) -> Result<ResultDocument, ClientError> {
        let deadline = Instant::now() + timeout;
        let mut consecutive_failures: u32 = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                job.observe(JobStatus::TimedOut);
                warn!(timeout_secs = timeout.as_secs(), "job did not finish in time");
                return Err(ClientError::Timeout {
                    job_id: job.id().clone(),
                    timeout,
                }
                .into());
            }

            // A single request may not outlive the budget.
            let Ok(attempt) =
                tokio::time::timeout(remaining, self.transport.get_history(job.id())).await
            else {
                continue;
            };

            let pause = match attempt {
                Ok(history) => {
                    consecutive_failures = 0;
                    match self.observe(job, &history)? {
                        Some(document) => return Ok(document),
                        None => self.policy.poll_interval,
                    }
                }
                Err(e) if e.is_transient() => {
                    consecutive_failures += 1;
                    if let Some(max) = self.policy.max_consecutive_failures
                        && consecutive_failures > max
                    {
                        warn!(error = %e, consecutive_failures, "giving up on unreachable backend");
                        return Err(ClientError::BackendUnavailable {
                            reason: format!(
                                "{consecutive_failures} consecutive poll failures, last: {e}"
                            ),
                        }
                        .into());
                    }
                    debug!(error = %e, consecutive_failures, "poll failed, retrying");
                    self.policy.retry_backoff
                }
                Err(e) => {
                    job.observe(JobStatus::Errored);
                    warn!(error = %e, "backend gave a definitive failure while polling");
                    return Err(ClientError::BackendJobError {
                        job_id: job.id().clone(),
                        detail: e.to_string(),
                    }
                    .into());
                }
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(pause.min(remaining)).await;
        }
    }

    /// Applies one history response to the job.
    ///
    /// Returns the document once the job is complete, `None` while it is
    /// still pending or running.
    fn observe(
        &self,
        job: &mut Job,
        history: &serde_json::Value,
    ) -> Result<Option<ResultDocument>, ClientError> {
        let document = ResultDocument::from_history(history, job.id()).map_err(|e| {
            job.observe(JobStatus::Errored);
            ClientError::BackendJobError {
                job_id: job.id().clone(),
                detail: TransportError::Decode {
                    reason: e.to_string(),
                }
                .to_string(),
            }
        })?;

        let Some(document) = document else {
            job.observe(JobStatus::Pending);
            debug!("job not in history yet");
            return Ok(None);
        };

        let observed = document.observed_status();
        if job.observe(observed) {
            debug!(status = %observed, "job status changed");
        }

        match observed {
            JobStatus::Completed => {
                info!("job completed");
                Ok(Some(document))
            }
            JobStatus::Errored => {
                let detail = document
                    .status
                    .error_detail()
                    .unwrap_or_else(|| "unknown backend error".to_string());
                warn!(detail = %detail, "backend reported job error");
                Err(ClientError::BackendJobError {
                    job_id: job.id().clone(),
                    detail,
                }
                .into())
            }
            _ => Ok(None),
        }
    }

    /// Extracts output references from a completed result document.
    #[must_use]
    pub fn extract_outputs(&self, document: &ResultDocument) -> Vec<Output> {
        document::extract_outputs(document)
    }

    /// Returns true if the backend root answers 200.
    ///
    /// Never fails; any transport error counts as unreachable.
    #[instrument(skip_all)]
    pub async fn health_check(&self) -> bool {
        match self.transport.get_root().await {
            Ok(200) => true,
            Ok(status) => {
                debug!(status, "backend health probe returned non-200");
                false
            }
            Err(e) => {
                debug!(error = %e, "backend health probe failed");
                false
            }
        }
    }

    /// Returns the backend's queue snapshot.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` on any transport failure.
    #[instrument(skip_all)]
    pub async fn queue(&self) -> Result<QueueInfo, ClientError> {
        Ok(self.transport.get_queue().await.map_err(ClientError::from)?)
    }

    /// Returns the backend's history record for one job.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the backend has no record for the id and
    /// `BackendUnavailable` on any other failure.
    #[instrument(skip(self))]
    pub async fn history(&self, job_id: &JobId) -> Result<ResultDocument, ClientError> {
        let not_found = || ClientError::NotFound {
            job_id: job_id.clone(),
        };

        let history = match self.transport.get_history(job_id).await {
            Ok(history) => history,
            Err(e) if e.status() == Some(404) => return Err(not_found().into()),
            Err(e) => return Err(ClientError::from(e).into()),
        };

        ResultDocument::from_history(&history, job_id)
            .map_err(|e| ClientError::BackendUnavailable {
                reason: format!("malformed history record: {e}"),
            })?
            .ok_or_else(|| not_found().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::OutputKind;
    use crate::testing::{
        ScriptedTransport, completed_history, errored_history, pending_history, running_history,
        transient,
    };
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn client(transport: ScriptedTransport) -> JobClient<ScriptedTransport> {
        JobClient::new(transport, PollPolicy::default())
    }

    fn kind<V>(result: &Result<V, ClientError>) -> &ClientError {
        match result {
            Ok(_) => panic!("expected an error"),
            Err(report) => report.current_context(),
        }
    }

    fn payload() -> Payload {
        Payload::new(serde_json::Map::new())
    }

    #[tokio::test]
    async fn submit_returns_pending_job() {
        let transport = ScriptedTransport::new().accept_prompt("p-1");
        let client = client(transport);

        let job = client.submit(&payload()).await.expect("submitted");
        assert_eq!(job.id().as_str(), "p-1");
        assert_eq!(job.status(), JobStatus::Pending);
    }

    #[tokio::test]
    async fn submit_rejection_carries_backend_body() {
        let transport = ScriptedTransport::new().reject_prompt(TransportError::from_status(
            400,
            r#"{"error": {"type": "prompt_no_outputs"}}"#,
        ));
        let client = client(transport);

        let result = client.submit(&payload()).await;
        match kind(&result) {
            ClientError::BackendUnavailable { reason } => {
                assert!(reason.contains("400"));
                assert!(reason.contains("prompt_no_outputs"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn submit_without_prompt_id_is_unavailable() {
        let transport = ScriptedTransport::new().respond_to_prompt(json!({"number": 3}));
        let client = client(transport);

        let result = client.submit(&payload()).await;
        assert!(matches!(
            kind(&result),
            ClientError::BackendUnavailable { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_returns_completed_document() {
        let outputs = json!({"9": {"images": [{"filename": "a.png", "subfolder": ""}]}});
        let transport = ScriptedTransport::new().script_history(
            "p-1",
            vec![
                Ok(pending_history()),
                Ok(running_history("p-1")),
                Ok(completed_history("p-1", outputs)),
            ],
        );
        let client = client(transport.clone());
        let mut job = Job::submitted(JobId::new("p-1"));

        let document = client
            .poll_until_done(&mut job, TIMEOUT)
            .await
            .expect("completed");
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(transport.calls().history, 3);

        let outputs = client.extract_outputs(&document);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].kind, OutputKind::Image);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_surfaces_backend_error_text() {
        let transport = ScriptedTransport::new().script_history(
            "p-1",
            vec![Ok(errored_history("p-1", "Prompt outputs failed validation"))],
        );
        let client = client(transport.clone());
        let mut job = Job::submitted(JobId::new("p-1"));

        let result = client.poll_until_done(&mut job, TIMEOUT).await;
        match kind(&result) {
            ClientError::BackendJobError { detail, .. } => {
                assert_eq!(detail, "Prompt outputs failed validation");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(job.status(), JobStatus::Errored);
        // Polling stops at the terminal state.
        assert_eq!(transport.calls().history, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out_within_bounds() {
        let transport =
            ScriptedTransport::new().script_history("p-1", vec![Ok(pending_history())]);
        let client = client(transport);
        let mut job = Job::submitted(JobId::new("p-1"));
        let policy = *client.policy();

        let started = Instant::now();
        let result = client.poll_until_done(&mut job, TIMEOUT).await;
        let elapsed = started.elapsed();

        assert!(matches!(kind(&result), ClientError::Timeout { .. }));
        assert_eq!(job.status(), JobStatus::TimedOut);
        assert!(elapsed >= TIMEOUT, "timed out early: {elapsed:?}");
        assert!(
            elapsed <= TIMEOUT + policy.poll_interval + policy.retry_backoff,
            "timed out late: {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out_while_backend_unreachable() {
        let transport = ScriptedTransport::new().script_history("p-1", vec![Err(transient())]);
        let client = client(transport);
        let mut job = Job::submitted(JobId::new("p-1"));

        let started = Instant::now();
        let result = client.poll_until_done(&mut job, TIMEOUT).await;
        let elapsed = started.elapsed();

        // Retried failures stay invisible; only the timeout is reported.
        assert!(matches!(kind(&result), ClientError::Timeout { .. }));
        assert!(elapsed >= TIMEOUT);
        assert!(elapsed <= TIMEOUT + Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_invisible() {
        let transport = ScriptedTransport::new().script_history(
            "p-1",
            vec![
                Err(transient()),
                Err(TransportError::from_status(503, "busy")),
                Ok(running_history("p-1")),
                Err(transient()),
                Ok(completed_history("p-1", json!({}))),
            ],
        );
        let client = client(transport.clone());
        let mut job = Job::submitted(JobId::new("p-1"));

        let started = Instant::now();
        client
            .poll_until_done(&mut job, TIMEOUT)
            .await
            .expect("completed despite transient failures");
        assert_eq!(transport.calls().history, 5);
        // Three backoffs and one regular interval.
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_job_fails_fast() {
        let transport = ScriptedTransport::new().script_history(
            "missing",
            vec![Err(TransportError::from_status(404, "Not Found"))],
        );
        let client = client(transport.clone());
        let mut job = Job::submitted(JobId::new("missing"));

        let result = client.poll_until_done(&mut job, TIMEOUT).await;
        match kind(&result) {
            ClientError::BackendJobError { detail, .. } => assert!(detail.contains("404")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.calls().history, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_failure_guard() {
        let transport = ScriptedTransport::new().script_history("p-1", vec![Err(transient())]);
        let client = JobClient::new(
            transport.clone(),
            PollPolicy {
                max_consecutive_failures: Some(3),
                ..PollPolicy::default()
            },
        );
        let mut job = Job::submitted(JobId::new("p-1"));

        let result = client.poll_until_done(&mut job, TIMEOUT).await;
        assert!(matches!(
            kind(&result),
            ClientError::BackendUnavailable { .. }
        ));
        assert_eq!(transport.calls().history, 4);
        assert!(!job.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_request_cannot_overrun_budget() {
        let transport = ScriptedTransport::new()
            .script_history("p-1", vec![Ok(pending_history())])
            .with_latency(Duration::from_secs(60));
        let client = client(transport);
        let mut job = Job::submitted(JobId::new("p-1"));

        let started = Instant::now();
        let result = client.poll_until_done(&mut job, TIMEOUT).await;
        assert!(matches!(kind(&result), ClientError::Timeout { .. }));
        assert_eq!(started.elapsed(), TIMEOUT);
    }

    #[tokio::test]
    async fn health_check_reports_reachability() {
        let up = client(ScriptedTransport::new());
        assert!(up.health_check().await);

        let down = client(ScriptedTransport::new().unreachable());
        assert!(!down.health_check().await);

        let erroring = client(ScriptedTransport::new().with_root_status(500));
        assert!(!erroring.health_check().await);
    }

    #[tokio::test]
    async fn queue_passthrough() {
        let snapshot = json!({"queue_running": [], "queue_pending": [[0, "p-1"]]});
        let healthy = client(ScriptedTransport::new().with_queue(Ok(snapshot.clone())));
        assert_eq!(healthy.queue().await.expect("queue"), snapshot);

        let failing = client(ScriptedTransport::new().with_queue(Err(transient())));
        let result = failing.queue().await;
        assert!(matches!(
            kind(&result),
            ClientError::BackendUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn history_lookup() {
        let transport = ScriptedTransport::new()
            .script_history("p-1", vec![Ok(completed_history("p-1", json!({})))])
            .script_history("gone", vec![Err(TransportError::from_status(404, ""))]);
        let client = client(transport);

        let document = client.history(&JobId::new("p-1")).await.expect("found");
        assert!(document.status.completed);

        let result = client.history(&JobId::new("unknown")).await;
        assert!(matches!(kind(&result), ClientError::NotFound { .. }));

        let result = client.history(&JobId::new("gone")).await;
        assert!(matches!(kind(&result), ClientError::NotFound { .. }));
    }
}
