//! The request gateway.

use crate::error::GatewayError;
use crate::request::GenerateRequest;
use crate::workflow::{build_payload, resolve_seed};
use chrono::Utc;
use comfy_relay_client::{
    BackendTransport, JobClient, JobStatus, Output, QueueInfo, ResultDocument,
};
use comfy_relay_core::{JobId, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Gateway settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Overall budget for one generation job.
    pub job_timeout: Duration,
    /// Checkpoint used when a request does not name one.
    pub default_checkpoint: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(600),
            default_checkpoint: "bigLove_photo1.3.safetensors".to_string(),
        }
    }
}

/// Outcome of a successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResult {
    /// Backend job id.
    pub job_id: JobId,
    /// Terminal job status.
    pub status: JobStatus,
    /// Seed the sampler ran with.
    pub seed: u64,
    /// Produced artifacts, in result-document order.
    pub outputs: Vec<Output>,
}

/// Reachability summary for the gateway and its backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `healthy` or `unhealthy`.
    pub status: String,
    /// `ok` or `error`.
    pub backend: String,
    /// Unix timestamp of the check.
    pub timestamp: i64,
}

/// Translates generation requests into backend jobs.
pub struct Gateway<T: BackendTransport> {
    client: JobClient<T>,
    config: GatewayConfig,
}

impl<T: BackendTransport> Gateway<T> {
    /// Creates a gateway over a configured client.
    pub fn new(client: JobClient<T>, config: GatewayConfig) -> Self {
        Self { client, config }
    }

    /// Returns the gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Runs one generation request to completion.
    ///
    /// # Errors
    ///
    /// - `Validation` before any backend call if a field is out of bounds
    /// - `BackendUnavailable` if the backend fails its health probe
    /// - `Timeout` if the job does not finish within the job timeout
    /// - `GenerationFailed` for any other failure
    #[instrument(skip_all)]
    pub async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerateResult, GatewayError> {
        let validated = request.validate(&self.config.default_checkpoint)?;

        if !self.client.health_check().await {
            warn!("backend failed health probe, not submitting");
            return Err(GatewayError::BackendUnavailable {
                reason: "backend did not answer its health probe".to_string(),
            }
            .into());
        }

        let seed = resolve_seed(validated.seed).map_err(|e| GatewayError::GenerationFailed {
            detail: format!("failed to draw a seed: {e}"),
        })?;
        let payload = build_payload(&validated, seed);

        let mut job = self
            .client
            .submit(&payload)
            .await
            .map_err(|report| GatewayError::from_generation(report.current_context()))?;

        let document = self
            .client
            .poll_until_done(&mut job, self.config.job_timeout)
            .await
            .map_err(|report| GatewayError::from_generation(report.current_context()))?;

        let outputs = self.client.extract_outputs(&document);
        info!(job_id = %job.id(), outputs = outputs.len(), "generation finished");

        Ok(GenerateResult {
            job_id: job.id().clone(),
            status: job.status(),
            seed,
            outputs,
        })
    }

    /// Returns the backend's queue snapshot.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` on any transport failure.
    pub async fn queue_status(&self) -> Result<QueueInfo, GatewayError> {
        Ok(self
            .client
            .queue()
            .await
            .map_err(|report| GatewayError::from_query(report.current_context()))?)
    }

    /// Returns the backend's record for one job.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the backend has no record for the id and
    /// `BackendUnavailable` on any other failure.
    pub async fn job_history(&self, job_id: &JobId) -> Result<ResultDocument, GatewayError> {
        Ok(self
            .client
            .history(job_id)
            .await
            .map_err(|report| GatewayError::from_query(report.current_context()))?)
    }

    /// Probes the backend.
    pub async fn health(&self) -> HealthReport {
        let backend_ok = self.client.health_check().await;
        HealthReport {
            status: if backend_ok { "healthy" } else { "unhealthy" }.to_string(),
            backend: if backend_ok { "ok" } else { "error" }.to_string(),
            timestamp: Utc::now().timestamp(),
        }
    }
}
