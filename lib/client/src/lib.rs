//! Job client for the ComfyUI generation backend.
//!
//! The client owns the submit/poll/extract protocol against the backend's
//! HTTP interface:
//!
//! - **Submit**: post a payload graph and receive the backend's job id
//! - **Poll**: query history until the job completes, errors, or runs out of time
//! - **Extract**: turn a completed result document into ordered output references
//!
//! All network access goes through the [`BackendTransport`] seam, which
//! classifies failures as transient (retried while polling) or definitive.

pub mod client;
pub mod document;
pub mod error;
pub mod job;
pub mod payload;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{ClientConfig, JobClient, PollPolicy};
pub use document::{Output, OutputKind, QueueInfo, RecordStatus, ResultDocument, extract_outputs};
pub use error::{ClientError, TransportError};
pub use job::{Job, JobStatus};
pub use payload::Payload;
pub use transport::{BackendTransport, HttpTransport, RequestTimeouts};
