//! # Pipeline Coordinator
//!
//! Runs one archive pass:
//!
//! 1. list the channel through the [`SourceLister`]
//! 2. drop items the ledger already holds
//! 3. dispatch the rest, in listing order, to at most `worker_count` workers
//! 4. collect one [`JobReport`] per dispatched item, in completion order
//!
//! Each worker runs Fetch → Upload → Commit → Cleanup for a single item and
//! owns that item's [`TransferJob`]. Nothing a worker does can fail the pass;
//! panics are caught and reported as failed jobs.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = PipelineCoordinator::new(lister, fetcher, uploader, ledger, bus, config);
//! let summary = coordinator.run_pass(50, &token).await?;
//! println!("{} archived, {} failed", summary.done, summary.failed);
//! ```

use bridge_traits::media::CatalogItem;
use core_async::fs;
use core_async::sync::{CancellationToken, Semaphore};
use core_async::task::JoinSet;
use core_async::time::{Duration, Instant};
use core_ledger::ArchiveLedger;
use core_runtime::events::{ArchiveEvent, EventBus};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::fetcher::Fetcher;
use crate::job::{FailureReason, JobOutcome, JobReport, JobStatus, TransferJob};
use crate::lister::SourceLister;
use crate::naming::{output_stem, remote_subpath};
use crate::uploader::{UploadFailure, Uploader};
use crate::{ArchiveError, Result};

/// Items dispatched in the current pass that have not reported yet.
#[derive(Debug, Default)]
struct InFlight {
    ids: HashSet<String>,
}

impl InFlight {
    fn dispatched(&mut self, item_id: &str) {
        self.ids.insert(item_id.to_string());
    }

    fn finished(&mut self, item_id: &str) {
        self.ids.remove(item_id);
    }

    /// Remaining ids, sorted.
    fn unreported(self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.into_iter().collect();
        ids.sort();
        ids
    }
}

/// Hard upper bound on concurrent workers.
pub const MAX_WORKERS: usize = 8;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Concurrent workers, clamped to `1..=MAX_WORKERS`
    pub worker_count: usize,
    /// List and log only; no fetch, upload or ledger write
    pub dry_run: bool,
    /// Local work directory for fetched files
    pub download_dir: PathBuf,
    /// Optional top-level remote folder above the year folders
    pub channel_folder: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            dry_run: false,
            download_dir: PathBuf::from("./downloads"),
            channel_folder: None,
        }
    }
}

/// Aggregate result of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub pass_id: String,
    pub listed: usize,
    pub already_archived: usize,
    /// Ids a dry run would have processed
    pub planned: Vec<String>,
    pub done: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub dry_run: bool,
    pub duration: Duration,
}

impl PassSummary {
    fn new(pass_id: String, dry_run: bool) -> Self {
        Self {
            pass_id,
            dry_run,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Done { .. } => self.done += 1,
            JobOutcome::Failed { .. } => self.failed += 1,
            JobOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

pub struct PipelineCoordinator {
    lister: Arc<SourceLister>,
    worker: Arc<Worker>,
    ledger: Arc<dyn ArchiveLedger>,
    event_bus: EventBus,
    config: CoordinatorConfig,
}

impl PipelineCoordinator {
    pub fn new(
        lister: Arc<SourceLister>,
        fetcher: Arc<Fetcher>,
        uploader: Arc<Uploader>,
        ledger: Arc<dyn ArchiveLedger>,
        event_bus: EventBus,
        config: CoordinatorConfig,
    ) -> Self {
        let worker = Arc::new(Worker {
            fetcher,
            uploader,
            ledger: Arc::clone(&ledger),
            download_dir: config.download_dir.clone(),
            channel_folder: config.channel_folder.clone().filter(|f| !f.is_empty()),
        });
        Self {
            lister,
            worker,
            ledger,
            event_bus,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Runs one pass over at most `max_results` recent items.
    ///
    /// Returns only after every dispatched worker has finished.
    ///
    /// # Errors
    ///
    /// Returns an error only when the pass cannot start, e.g. the download
    /// directory cannot be created. Per-item failures are counted in the
    /// summary instead.
    #[instrument(skip(self, token))]
    pub async fn run_pass(
        &self,
        max_results: usize,
        token: &CancellationToken,
    ) -> Result<PassSummary> {
        let started = Instant::now();
        let pass_id = Uuid::new_v4().to_string();
        let mut summary = PassSummary::new(pass_id.clone(), self.config.dry_run);

        if token.is_cancelled() {
            info!("Shutdown requested before pass start; nothing to do");
            return Ok(summary);
        }

        if !self.config.dry_run {
            fs::create_dir_all(&self.config.download_dir)
                .await
                .map_err(|e| {
                    ArchiveError::Unexpected(format!(
                        "cannot create download directory {}: {}",
                        self.config.download_dir.display(),
                        e
                    ))
                })?;
        }

        self.emit(ArchiveEvent::PassStarted {
            pass_id: pass_id.clone(),
            max_results,
            dry_run: self.config.dry_run,
        });

        let items = self.lister.list_recent(max_results).await;
        summary.listed = items.len();

        let mut pending = Vec::with_capacity(items.len());
        for item in items {
            match self.ledger.is_archived(&item.id).await {
                Ok(true) => summary.already_archived += 1,
                Ok(false) => pending.push(item),
                Err(e) => {
                    error!(item_id = %item.id, error = %e, "Ledger lookup failed; skipping item this pass");
                    summary.failed += 1;
                    self.emit(ArchiveEvent::ItemFailed {
                        pass_id: pass_id.clone(),
                        item_id: item.id.clone(),
                        reason: format!("{}: {}", FailureReason::LedgerIo, e),
                    });
                }
            }
        }

        info!(
            listed = summary.listed,
            already_archived = summary.already_archived,
            pending = pending.len(),
            "Filtered catalog against ledger"
        );

        if self.config.dry_run {
            for item in &pending {
                info!(
                    item_id = %item.id,
                    "[DRY RUN] would archive '{}' -> {}",
                    item.title,
                    self.worker.destination_for(item)
                );
                summary.planned.push(item.id.clone());
            }
        } else {
            self.dispatch(pending, &pass_id, token, &mut summary).await?;
        }

        summary.duration = started.elapsed();
        info!(
            done = summary.done,
            failed = summary.failed,
            cancelled = summary.cancelled,
            planned = summary.planned.len(),
            duration_ms = summary.duration.as_millis() as u64,
            "Pass complete"
        );
        self.emit(ArchiveEvent::PassCompleted {
            pass_id,
            listed: summary.listed,
            done: summary.done,
            failed: summary.failed,
            cancelled: summary.cancelled,
            duration_ms: summary.duration.as_millis() as u64,
        });

        Ok(summary)
    }

    async fn dispatch(
        &self,
        pending: Vec<CatalogItem>,
        pass_id: &str,
        token: &CancellationToken,
        summary: &mut PassSummary,
    ) -> Result<()> {
        let worker_count = self.config.worker_count.clamp(1, MAX_WORKERS);
        let semaphore = Arc::new(Semaphore::new(worker_count));
        let mut workers: JoinSet<JobReport> = JoinSet::new();
        let mut in_flight = InFlight::default();

        for item in pending {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| ArchiveError::Unexpected(format!("worker pool closed: {}", e)))?;

            if token.is_cancelled() {
                debug!(item_id = %item.id, "Not dispatching; shutdown requested");
                self.report(pass_id, summary, item.id, JobOutcome::Cancelled);
                continue;
            }

            in_flight.dispatched(&item.id);
            let worker = Arc::clone(&self.worker);
            let token = token.clone();
            workers.spawn(async move {
                let _permit = permit;
                let item_id = item.id.clone();
                match AssertUnwindSafe(worker.run(item, &token)).catch_unwind().await {
                    Ok(report) => report,
                    Err(_) => {
                        error!(%item_id, "Worker panicked");
                        JobReport {
                            item_id,
                            attempts: 0,
                            outcome: JobOutcome::failed(FailureReason::Unexpected, "worker panicked"),
                        }
                    }
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => {
                    in_flight.finished(&report.item_id);
                    self.report(pass_id, summary, report.item_id, report.outcome);
                }
                Err(e) => error!(%pass_id, error = %e, "Worker task did not complete"),
            }
        }

        // Tasks that died without a report; their ids are only known here.
        for item_id in in_flight.unreported() {
            error!(%pass_id, %item_id, "No report from worker; counting item as failed");
            self.report(
                pass_id,
                summary,
                item_id,
                JobOutcome::failed(FailureReason::Unexpected, "worker task did not complete"),
            );
        }

        Ok(())
    }

    fn report(&self, pass_id: &str, summary: &mut PassSummary, item_id: String, outcome: JobOutcome) {
        summary.record(&outcome);
        let pass_id = pass_id.to_string();
        let event = match outcome {
            JobOutcome::Done {
                remote_path,
                bytes_transferred,
            } => ArchiveEvent::ItemArchived {
                pass_id,
                item_id,
                remote_path,
                bytes: bytes_transferred,
            },
            JobOutcome::Failed { reason, detail } => ArchiveEvent::ItemFailed {
                pass_id,
                item_id,
                reason: format!("{}: {}", reason, detail),
            },
            JobOutcome::Cancelled => ArchiveEvent::ItemCancelled { pass_id, item_id },
        };
        self.emit(event);
    }

    fn emit(&self, event: ArchiveEvent) {
        self.event_bus.emit(event).ok();
    }
}

/// Shared, stateless executor of one job at a time.
struct Worker {
    fetcher: Arc<Fetcher>,
    uploader: Arc<Uploader>,
    ledger: Arc<dyn ArchiveLedger>,
    download_dir: PathBuf,
    channel_folder: Option<String>,
}

impl Worker {
    fn subpath_for(&self, item: &CatalogItem) -> String {
        remote_subpath(self.channel_folder.as_deref(), item)
    }

    fn destination_for(&self, item: &CatalogItem) -> String {
        let subpath = self.subpath_for(item);
        self.uploader
            .store()
            .resolve(&format!("{}/{}", subpath, output_stem(item)))
    }

    #[instrument(skip(self, item, token), fields(item_id = %item.id))]
    async fn run(&self, item: CatalogItem, token: &CancellationToken) -> JobReport {
        let mut job = TransferJob::new(item);
        let outcome = match self.execute(&mut job, token).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, status = %job.status(), "Job aborted");
                job.fail(FailureReason::Unexpected, e.to_string())
            }
        };

        match &outcome {
            JobOutcome::Done { remote_path, .. } => info!(%remote_path, "Item archived"),
            JobOutcome::Failed { reason, detail } => {
                warn!(attempts = job.attempt_count, %reason, %detail, "Item failed")
            }
            JobOutcome::Cancelled => info!(status = %job.status(), "Item cancelled"),
        }
        job.into_report(outcome)
    }

    async fn execute(&self, job: &mut TransferJob, token: &CancellationToken) -> Result<JobOutcome> {
        if token.is_cancelled() {
            return job.cancel();
        }

        // Fetching
        job.advance(JobStatus::Fetching)?;
        let local_path = match self
            .fetcher
            .fetch(&job.item, &self.download_dir, token)
            .await
        {
            Ok(path) => path,
            Err(ArchiveError::Cancelled) => return job.cancel(),
            Err(e) => {
                if let ArchiveError::TransientFetch { attempts, .. } = &e {
                    job.attempt_count = *attempts;
                }
                return Ok(job.fail(FailureReason::FetchExhausted, e.to_string()));
            }
        };

        if token.is_cancelled() {
            return job.cancel();
        }

        // Uploading
        job.fetched(local_path.clone())?;
        let subpath = self.subpath_for(&job.item);
        let upload = self.uploader.upload(&local_path, &subpath, token).await?;
        job.attempt_count = upload.retries + 1;

        if !upload.success {
            return match upload.failure {
                Some(UploadFailure::Cancelled) => job.cancel(),
                Some(failure) => Ok(job.fail(FailureReason::UploadExhausted, failure.to_string())),
                None => Ok(job.fail(FailureReason::UploadExhausted, "unknown failure")),
            };
        }

        // Committing: not a cancellation checkpoint
        job.advance(JobStatus::Committing)?;
        if let Err(e) = self
            .ledger
            .record_archived(
                &job.item.id,
                &job.item.title,
                &job.item.published_at,
                &upload.remote_path,
            )
            .await
        {
            error!(error = %e, path = %local_path.display(), "Ledger write failed; keeping local file");
            return Ok(job.fail(FailureReason::LedgerIo, e.to_string()));
        }

        if let Err(e) = fs::remove_file(&local_path).await {
            warn!(error = %e, path = %local_path.display(), "Could not remove local file after commit");
        }

        job.advance(JobStatus::Committed)?;
        Ok(JobOutcome::Done {
            remote_path: upload.remote_path,
            bytes_transferred: upload.bytes_transferred,
        })
    }
}
