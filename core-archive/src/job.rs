//! # Transfer Job State Machine
//!
//! One job per catalog item per pass. Jobs live only in memory and are owned
//! by the worker running them; the coordinator sees the final [`JobReport`].
//!
//! ```text
//! Pending → Fetching → Uploading → Committing → Committed
//!    │          │           │            │
//!    └──────────┴─────┬─────┴────────────┘
//!                     ↓
//!             Failed / Cancelled
//! ```
//!
//! `Committing` cannot be cancelled: an upload that finished is always
//! recorded.

use crate::{ArchiveError, Result};
use bridge_traits::media::CatalogItem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Fetching,
    Uploading,
    Committing,
    Committed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Committed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Fetching => "fetching",
            JobStatus::Uploading => "uploading",
            JobStatus::Committing => "committing",
            JobStatus::Committed => "committed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Fetching, Uploading)
                | (Fetching, Failed)
                | (Fetching, Cancelled)
                | (Uploading, Committing)
                | (Uploading, Failed)
                | (Uploading, Cancelled)
                | (Committing, Committed)
                | (Committing, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    FetchExhausted,
    UploadExhausted,
    LedgerIo,
    Unexpected,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureReason::FetchExhausted => "fetch exhausted",
            FailureReason::UploadExhausted => "upload exhausted",
            FailureReason::LedgerIo => "ledger I/O error",
            FailureReason::Unexpected => "unexpected error",
        })
    }
}

/// Terminal result of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done {
        remote_path: String,
        bytes_transferred: u64,
    },
    Failed {
        reason: FailureReason,
        detail: String,
    },
    Cancelled,
}

impl JobOutcome {
    pub fn failed(reason: FailureReason, detail: impl Into<String>) -> Self {
        JobOutcome::Failed {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, JobOutcome::Done { .. })
    }
}

/// What a worker hands back to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub item_id: String,
    pub attempts: u32,
    pub outcome: JobOutcome,
}

/// In-flight state of one item.
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub item: CatalogItem,
    pub attempt_count: u32,
    pub local_path: Option<PathBuf>,
    status: JobStatus,
}

impl TransferJob {
    pub fn new(item: CatalogItem) -> Self {
        Self {
            item,
            attempt_count: 0,
            local_path: None,
            status: JobStatus::Pending,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Moves to `next`, rejecting transitions the state machine forbids.
    pub fn advance(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ArchiveError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Records the fetched file and moves to `Uploading`.
    pub fn fetched(&mut self, local_path: PathBuf) -> Result<()> {
        self.advance(JobStatus::Uploading)?;
        self.local_path = Some(local_path);
        Ok(())
    }

    /// Ends the job as `Failed` from any non-terminal state.
    pub fn fail(&mut self, reason: FailureReason, detail: impl Into<String>) -> JobOutcome {
        if !self.status.is_terminal() {
            self.status = JobStatus::Failed;
        }
        JobOutcome::failed(reason, detail)
    }

    /// Ends the job as `Cancelled`, unless it is already committing.
    pub fn cancel(&mut self) -> Result<JobOutcome> {
        self.advance(JobStatus::Cancelled)?;
        Ok(JobOutcome::Cancelled)
    }

    pub fn into_report(self, outcome: JobOutcome) -> JobReport {
        JobReport {
            item_id: self.item.id,
            attempts: self.attempt_count,
            outcome,
        }
    }
}
