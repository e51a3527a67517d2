//! Backend transport abstraction.
//!
//! [`BackendTransport`] has one method per backend endpoint and reports
//! failures as [`TransportError`], classified where the HTTP call is made.
//! [`HttpTransport`] is the production implementation; tests substitute an
//! in-memory one.

use crate::error::TransportError;
use crate::payload::Payload;
use async_trait::async_trait;
use comfy_relay_core::JobId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

/// Per-request timeouts, independent of the overall job budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTimeouts {
    /// Job submission.
    pub submit: Duration,
    /// One history or queue query.
    pub query: Duration,
    /// Reachability probe.
    pub probe: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            submit: Duration::from_secs(30),
            query: Duration::from_secs(15),
            probe: Duration::from_secs(5),
        }
    }
}

/// Trait for talking to the generation backend.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    /// Submits a payload; returns the intake response body.
    async fn post_prompt(&self, payload: &Payload) -> Result<JsonValue, TransportError>;

    /// Fetches the history response for one job.
    async fn get_history(&self, job_id: &JobId) -> Result<JsonValue, TransportError>;

    /// Fetches the queue snapshot.
    async fn get_queue(&self) -> Result<JsonValue, TransportError>;

    /// Probes the backend root; returns the HTTP status of any response.
    async fn get_root(&self) -> Result<u16, TransportError>;
}

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    timeouts: RequestTimeouts,
}

impl HttpTransport {
    /// Creates a transport for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        timeouts: RequestTimeouts,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Invalid {
                reason: e.to_string(),
            })?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            timeouts,
        })
    }

    /// Returns the normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// History URL with the job id percent-encoded as one path segment.
    fn history_url(&self, job_id: &JobId) -> Result<reqwest::Url, TransportError> {
        let mut url =
            reqwest::Url::parse(&self.url("/history")).map_err(|e| TransportError::Invalid {
                reason: e.to_string(),
            })?;
        url.path_segments_mut()
            .map_err(|()| TransportError::Invalid {
                reason: format!("base URL '{}' cannot carry a path", self.base_url),
            })?
            .push(job_id.as_str());
        Ok(url)
    }

    async fn read_json(response: reqwest::Response) -> Result<JsonValue, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::from_status(status.as_u16(), &body));
        }
        response.json().await.map_err(classify)
    }
}

/// Sorts a `reqwest` failure into retryable and definitive buckets.
fn classify(e: reqwest::Error) -> TransportError {
    if e.is_decode() {
        TransportError::Decode {
            reason: e.to_string(),
        }
    } else if e.is_builder() {
        TransportError::Invalid {
            reason: e.to_string(),
        }
    } else if let Some(status) = e.status() {
        TransportError::from_status(status.as_u16(), "")
    } else {
        // Connect, timeout, request, and body failures.
        TransportError::Transient {
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl BackendTransport for HttpTransport {
    async fn post_prompt(&self, payload: &Payload) -> Result<JsonValue, TransportError> {
        let url = self.url("/prompt");
        debug!(endpoint = %url, nodes = payload.graph().len(), "submitting payload");

        let response = self
            .http
            .post(&url)
            .timeout(self.timeouts.submit)
            .json(&payload.to_request_body())
            .send()
            .await
            .map_err(classify)?;
        Self::read_json(response).await
    }

    async fn get_history(&self, job_id: &JobId) -> Result<JsonValue, TransportError> {
        let response = self
            .http
            .get(self.history_url(job_id)?)
            .timeout(self.timeouts.query)
            .send()
            .await
            .map_err(classify)?;
        Self::read_json(response).await
    }

    async fn get_queue(&self) -> Result<JsonValue, TransportError> {
        let response = self
            .http
            .get(self.url("/queue"))
            .timeout(self.timeouts.query)
            .send()
            .await
            .map_err(classify)?;
        Self::read_json(response).await
    }

    async fn get_root(&self) -> Result<u16, TransportError> {
        let response = self
            .http
            .get(self.url("/"))
            .timeout(self.timeouts.probe)
            .send()
            .await
            .map_err(classify)?;
        Ok(response.status().as_u16())
    }
}
