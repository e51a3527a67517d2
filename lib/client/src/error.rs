//! Error types for the job client.
//!
//! Errors are split by layer:
//! - `TransportError`: one HTTP exchange with the backend, classified at the
//!   call boundary so the poll loop can tell retryable faults from answers
//! - `ClientError`: the outcome of a client operation, carried in a
//!   rootcause `Report` to callers

use comfy_relay_core::JobId;
use std::fmt;
use std::time::Duration;

/// Upper bound on how much of a backend response body is kept for diagnostics.
pub const BODY_EXCERPT_LIMIT: usize = 512;

/// Truncates a response body to [`BODY_EXCERPT_LIMIT`] bytes on a char boundary.
#[must_use]
pub fn body_excerpt(body: &str) -> String {
    if body.len() <= BODY_EXCERPT_LIMIT {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Failure of a single request to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The exchange failed in a way that may succeed on retry: connection
    /// refused or reset, request timeout, truncated body, or a gateway-style
    /// 502/503/504 from the backend.
    Transient { reason: String },
    /// The backend answered with a definitive non-success status.
    Status { status: u16, body: String },
    /// The backend answered 2xx but the body was not the expected JSON.
    Decode { reason: String },
    /// The request could not be built (bad base URL and the like).
    Invalid { reason: String },
}

impl TransportError {
    /// Classifies a non-success HTTP status.
    ///
    /// Gateway-style statuses are transient; everything else is definitive.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            502..=504 => Self::Transient {
                reason: format!("HTTP {status}: {}", body_excerpt(body)),
            },
            _ => Self::Status {
                status,
                body: body_excerpt(body),
            },
        }
    }

    /// Returns true if the failure should be retried while polling.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns the HTTP status for definitive status failures.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient { reason } => write!(f, "transient transport failure: {reason}"),
            Self::Status { status, body } => {
                if body.is_empty() {
                    write!(f, "backend returned HTTP {status}")
                } else {
                    write!(f, "backend returned HTTP {status}: {body}")
                }
            }
            Self::Decode { reason } => write!(f, "unexpected backend response: {reason}"),
            Self::Invalid { reason } => write!(f, "invalid backend request: {reason}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors from job client operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The backend could not be reached or refused the request.
    BackendUnavailable { reason: String },
    /// The backend reported that the job failed, or gave a definitive
    /// answer that ends polling.
    BackendJobError { job_id: JobId, detail: String },
    /// The job did not reach a terminal state within the budget.
    Timeout { job_id: JobId, timeout: Duration },
    /// The backend has no history record for the job.
    NotFound { job_id: JobId },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendUnavailable { reason } => {
                write!(f, "backend unavailable: {reason}")
            }
            Self::BackendJobError { job_id, detail } => {
                write!(f, "backend error for job {job_id}: {detail}")
            }
            Self::Timeout { job_id, timeout } => {
                write!(f, "job {job_id} timed out after {}s", timeout.as_secs())
            }
            Self::NotFound { job_id } => write!(f, "no history for job {job_id}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        Self::BackendUnavailable {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_statuses_are_transient() {
        for status in [502, 503, 504] {
            assert!(TransportError::from_status(status, "").is_transient());
        }
        let not_found = TransportError::from_status(404, "unknown prompt");
        assert!(!not_found.is_transient());
        assert_eq!(not_found.status(), Some(404));
        let server_error = TransportError::from_status(500, "boom");
        assert!(!server_error.is_transient());
    }

    #[test]
    fn body_excerpt_is_bounded() {
        let long = "x".repeat(BODY_EXCERPT_LIMIT * 3);
        let excerpt = body_excerpt(&long);
        assert!(excerpt.len() <= BODY_EXCERPT_LIMIT + 3);
        assert!(excerpt.ends_with("..."));
        assert_eq!(body_excerpt("short"), "short");
    }

    #[test]
    fn body_excerpt_respects_char_boundaries() {
        let long = "é".repeat(BODY_EXCERPT_LIMIT);
        let excerpt = body_excerpt(&long);
        assert!(excerpt.trim_end_matches("...").chars().all(|c| c == 'é'));
    }

    #[test]
    fn status_error_display_includes_body() {
        let err = TransportError::from_status(400, r#"{"error": "invalid prompt"}"#);
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("invalid prompt"));
    }

    #[test]
    fn client_error_display() {
        let err = ClientError::Timeout {
            job_id: JobId::new("p-1"),
            timeout: Duration::from_secs(600),
        };
        assert!(err.to_string().contains("p-1"));
        assert!(err.to_string().contains("600"));

        let err = ClientError::BackendJobError {
            job_id: JobId::new("p-2"),
            detail: "CUDA out of memory".to_string(),
        };
        assert!(err.to_string().contains("CUDA out of memory"));
    }
}
