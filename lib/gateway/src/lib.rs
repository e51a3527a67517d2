//! Request gateway for comfy-relay.
//!
//! Validates caller requests, builds the backend payload graph, and drives
//! the job client through submit, poll, and output extraction. The gateway
//! holds no state of its own beyond its configuration, so one instance can
//! serve any number of concurrent requests.

pub mod error;
pub mod gateway;
pub mod request;
pub mod workflow;

pub use error::{FieldViolation, GatewayError};
pub use gateway::{Gateway, GatewayConfig, GenerateResult, HealthReport};
pub use request::{GenerateRequest, ValidatedRequest};
pub use workflow::{build_payload, resolve_seed};
