//! Error types for the gateway.
//!
//! `GatewayError` is the caller-facing taxonomy. Client failures are mapped
//! onto it without changing their kind: a timeout stays a timeout, a missing
//! history record stays not-found.

use comfy_relay_client::ClientError;
use comfy_relay_core::JobId;
use std::fmt;

/// A request field outside its allowed range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Name of the offending field.
    pub field: &'static str,
    /// What the field must satisfy.
    pub reason: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Gateway errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request was rejected before any backend call.
    Validation { violations: Vec<FieldViolation> },
    /// The backend is unreachable or failed its health probe.
    BackendUnavailable { reason: String },
    /// The job did not finish within the configured budget.
    Timeout { job_id: JobId, timeout_secs: u64 },
    /// Generation failed for any other reason.
    GenerationFailed { detail: String },
    /// The backend has no record of the job.
    NotFound { job_id: JobId },
}

impl GatewayError {
    /// Maps a client failure during generation.
    #[must_use]
    pub fn from_generation(e: &ClientError) -> Self {
        match e {
            ClientError::Timeout { job_id, timeout } => Self::Timeout {
                job_id: job_id.clone(),
                timeout_secs: timeout.as_secs(),
            },
            other => Self::GenerationFailed {
                detail: other.to_string(),
            },
        }
    }

    /// Maps a client failure during a passthrough query.
    #[must_use]
    pub fn from_query(e: &ClientError) -> Self {
        match e {
            ClientError::NotFound { job_id } => Self::NotFound {
                job_id: job_id.clone(),
            },
            other => Self::BackendUnavailable {
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { violations } => {
                write!(f, "invalid request: ")?;
                for (i, violation) in violations.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{violation}")?;
                }
                Ok(())
            }
            Self::BackendUnavailable { reason } => {
                write!(f, "generation backend unavailable: {reason}")
            }
            Self::Timeout {
                job_id,
                timeout_secs,
            } => {
                write!(f, "job {job_id} timed out after {timeout_secs}s")
            }
            Self::GenerationFailed { detail } => write!(f, "generation failed: {detail}"),
            Self::NotFound { job_id } => write!(f, "job {job_id} not found"),
        }
    }
}

impl std::error::Error for GatewayError {}
