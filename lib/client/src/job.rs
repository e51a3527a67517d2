//! Job lifecycle as observed by the client.
//!
//! ```text
//! pending ──▶ running ──▶ completed
//!    │           │    └─▶ errored
//!    └───────────┴──────▶ timed_out
//! ```
//!
//! Status only moves forward. `timed_out` is decided by the client when the
//! polling budget runs out; the backend never reports it.

use chrono::{DateTime, Utc};
use comfy_relay_core::JobId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted by the backend, not yet in its history.
    Pending,
    /// Present in the backend's history without a terminal status.
    Running,
    /// The backend finished the job.
    Completed,
    /// The backend reported the job as failed.
    Errored,
    /// The client stopped waiting.
    TimedOut,
}

impl JobStatus {
    /// Returns true for states with no outgoing transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::TimedOut)
    }

    /// Returns the wire label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::TimedOut => "timed_out",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Errored | Self::TimedOut => 2,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted unit of backend work.
///
/// Owned by the caller for the duration of a request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    job_id: JobId,
    status: JobStatus,
    submitted_at: DateTime<Utc>,
}

impl Job {
    /// Creates a pending job for an id the backend just assigned.
    #[must_use]
    pub fn submitted(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            submitted_at: Utc::now(),
        }
    }

    /// Returns the backend-assigned id.
    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.job_id
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns when the job was submitted.
    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Returns true once the job can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Records an observed status.
    ///
    /// Regressions and anything observed after a terminal state are ignored.
    /// Returns true if the status changed.
    pub fn observe(&mut self, next: JobStatus) -> bool {
        if self.status.is_terminal() || next.rank() <= self.status.rank() {
            return false;
        }
        self.status = next;
        true
    }
}
