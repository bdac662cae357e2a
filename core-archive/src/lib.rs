//! # Archival Pipeline
//!
//! Mirrors a channel's catalog into remote storage, one pass at a time.
//!
//! ## Overview
//!
//! A pass lists the channel, drops items the ledger already holds, and runs
//! Fetch → Upload → Commit → Cleanup for the rest on a bounded worker pool.
//! The scheduler runs one large initial pass and then small incremental passes
//! on an interval until the shutdown token is cancelled.
//!
//! ## Components
//!
//! - **Naming** (`naming`): filesystem-safe stems and remote subpaths
//! - **Backoff** (`retry`): capped exponential delays with optional jitter
//! - **Transfer Job** (`job`): per-item state machine with validated transitions
//! - **Source Lister** (`lister`): ordered listing strategies with fallback
//! - **Fetcher** (`fetcher`): retried download into the local work directory
//! - **Uploader** (`uploader`): retried, verified transfer to the remote store
//! - **Pipeline Coordinator** (`coordinator`): one pass over a bounded worker pool
//! - **Scheduler Loop** (`scheduler`): initial sync, then periodic monitoring
//!
//! ## Failure Handling
//!
//! Workers never return errors to the coordinator. Every job ends as a
//! [`JobOutcome`]; items that failed stay out of the ledger and are picked up
//! again by the next pass.

pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod job;
pub mod lister;
pub mod naming;
pub mod retry;
pub mod scheduler;
pub mod uploader;

pub use coordinator::{CoordinatorConfig, PassSummary, PipelineCoordinator};
pub use error::{ArchiveError, Result};
pub use fetcher::Fetcher;
pub use job::{FailureReason, JobOutcome, JobReport, JobStatus, TransferJob};
pub use lister::SourceLister;
pub use naming::{output_stem, remote_subpath, sanitize_filename};
pub use retry::BackoffPolicy;
pub use scheduler::{PassRunner, SchedulerConfig, SchedulerLoop, SchedulerState, SchedulerStats};
pub use uploader::{UploadFailure, UploadResult, Uploader, UploaderConfig};
