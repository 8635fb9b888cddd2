//! # Print Jobs
//!
//! A print job belongs to the print service. This crate only holds a handle
//! to read its state or subscribe to its transitions.
//!
//! ## States
//!
//! ```text
//! Created ─▶ Queued ─▶ Started ─┬─▶ Completed
//!                         ▲  │  ├─▶ Failed
//!                         │  ▼  └─▶ Cancelled
//!                       Blocked
//! ```

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// Lifecycle state of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Being configured in the print dialog, not yet submitted
    Created,
    /// Submitted and waiting for the printer
    Queued,
    /// Printing
    Started,
    /// Printing paused by the printer (out of paper, offline)
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// No further transitions happen from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }

    /// The job got past submission churn: started, blocked or terminal.
    pub fn has_started(&self) -> bool {
        matches!(self, JobState::Started | JobState::Blocked) || self.is_terminal()
    }
}

/// Identifier the print service assigns to a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a job owned by the print service.
pub trait PrintJob: Send + Sync {
    fn id(&self) -> &JobId;

    /// Name the job was submitted under.
    fn name(&self) -> &str;

    /// Current state.
    fn state(&self) -> JobState;

    /// Subscribe to state transitions, when the service supports listeners.
    fn subscribe(&self) -> Option<watch::Receiver<JobState>> {
        None
    }
}
