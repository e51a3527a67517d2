//! HTTP error responses.
//!
//! Gateway errors become a status code and a `{"detail": ...}` body. The
//! status depends on the route as well as the error kind: a failed queue
//! query is a 500 even though the gateway reports the backend as
//! unavailable.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use comfy_relay_gateway::GatewayError;
use serde_json::json;

/// An error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    /// Creates an error response.
    #[must_use]
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Maps a failed generation request.
    #[must_use]
    pub fn generation(e: &GatewayError) -> Self {
        match e {
            GatewayError::Validation { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            GatewayError::BackendUnavailable { .. } => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "ComfyUI service unavailable",
            ),
            GatewayError::Timeout { .. } => {
                Self::new(StatusCode::REQUEST_TIMEOUT, "Generation timeout")
            }
            GatewayError::GenerationFailed { detail } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Generation failed: {detail}"),
            ),
            GatewayError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, e.to_string()),
        }
    }

    /// Maps a failed queue query.
    #[must_use]
    pub fn queue(e: &GatewayError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to get queue: {e}"),
        )
    }

    /// Maps a failed history query.
    #[must_use]
    pub fn history(e: &GatewayError) -> Self {
        match e {
            GatewayError::NotFound { job_id } => {
                Self::new(StatusCode::NOT_FOUND, format!("Job {job_id} not found"))
            }
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get history: {other}"),
            ),
        }
    }

    /// Returns the response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the human-readable detail.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "request failed");
        } else {
            tracing::debug!(status = %self.status, detail = %self.detail, "request rejected");
        }

        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comfy_relay_core::JobId;
    use comfy_relay_gateway::FieldViolation;

    #[test]
    fn generation_status_mapping() {
        let cases = [
            (
                GatewayError::Validation {
                    violations: vec![FieldViolation {
                        field: "width",
                        reason: "must be between 512 and 2048".to_string(),
                    }],
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                GatewayError::BackendUnavailable {
                    reason: "probe failed".to_string(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GatewayError::Timeout {
                    job_id: JobId::new("p-1"),
                    timeout_secs: 600,
                },
                StatusCode::REQUEST_TIMEOUT,
            ),
            (
                GatewayError::GenerationFailed {
                    detail: "boom".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::generation(&error).status(), status, "{error}");
        }
    }

    #[test]
    fn validation_detail_names_the_field() {
        let error = ApiError::generation(&GatewayError::Validation {
            violations: vec![FieldViolation {
                field: "steps",
                reason: "must be between 1 and 100".to_string(),
            }],
        });
        assert!(error.detail().contains("steps"));
    }

    #[test]
    fn queue_failures_are_internal_errors() {
        let error = ApiError::queue(&GatewayError::BackendUnavailable {
            reason: "connection refused".to_string(),
        });
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error.detail().contains("connection refused"));
    }

    #[test]
    fn history_mapping() {
        let missing = ApiError::history(&GatewayError::NotFound {
            job_id: JobId::new("p-1"),
        });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let failed = ApiError::history(&GatewayError::BackendUnavailable {
            reason: "reset".to_string(),
        });
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
