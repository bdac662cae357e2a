//! # Scheduler Loop
//!
//! ```text
//! InitialSync ──ok──> Monitoring ──┐
//!     │  ↑                 ↑       │ pass, then sleep(interval)
//!     └──┘ err: cooldown   └───────┘
//!
//! any state ── token cancelled ──> ShuttingDown
//! ```
//!
//! Sleeps run in short slices so a shutdown request is noticed within one
//! slice. A pass in progress is never interrupted by the loop itself; it
//! drains through its own cancellation checkpoints.

use async_trait::async_trait;
use core_async::sync::CancellationToken;
use core_async::time::{sleep_in_slices, Duration};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::coordinator::{PassSummary, PipelineCoordinator};
use crate::Result;

/// Something that can run one archive pass.
#[async_trait]
pub trait PassRunner: Send + Sync {
    async fn run_pass(&self, max_results: usize, token: &CancellationToken) -> Result<PassSummary>;
}

#[async_trait]
impl PassRunner for PipelineCoordinator {
    async fn run_pass(&self, max_results: usize, token: &CancellationToken) -> Result<PassSummary> {
        PipelineCoordinator::run_pass(self, max_results, token).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    InitialSync,
    Monitoring,
    ShuttingDown,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Result cap for the first, catalog-wide pass
    pub initial_scan_limit: usize,
    /// Result cap for each monitoring pass
    pub incremental_scan_limit: usize,
    pub polling_interval: Duration,
    /// Granularity at which sleeps notice shutdown
    pub sleep_slice: Duration,
    /// Wait after a failed pass before trying again
    pub error_cooldown: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_scan_limit: 5000,
            incremental_scan_limit: 50,
            polling_interval: Duration::from_secs(60 * 60),
            sleep_slice: Duration::from_secs(1),
            error_cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub passes_completed: u64,
    pub pass_failures: u64,
}

pub struct SchedulerLoop {
    runner: Arc<dyn PassRunner>,
    config: SchedulerConfig,
}

impl SchedulerLoop {
    pub fn new(runner: Arc<dyn PassRunner>, config: SchedulerConfig) -> Self {
        Self { runner, config }
    }

    /// Runs passes until `token` is cancelled.
    ///
    /// Never returns early because of a failed pass; failures are logged and
    /// retried after the cooldown.
    #[instrument(skip(self, token))]
    pub async fn run(&self, token: &CancellationToken) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut state = SchedulerState::InitialSync;

        loop {
            if token.is_cancelled() {
                state = SchedulerState::ShuttingDown;
            }

            let max_results = match state {
                SchedulerState::InitialSync => self.config.initial_scan_limit,
                SchedulerState::Monitoring => self.config.incremental_scan_limit,
                SchedulerState::ShuttingDown => break,
            };

            info!(?state, max_results, "Starting pass");
            let wait = match self.runner.run_pass(max_results, token).await {
                Ok(summary) => {
                    stats.passes_completed += 1;
                    info!(
                        pass_id = %summary.pass_id,
                        done = summary.done,
                        failed = summary.failed,
                        cancelled = summary.cancelled,
                        "Pass finished"
                    );
                    state = SchedulerState::Monitoring;
                    self.config.polling_interval
                }
                Err(e) => {
                    stats.pass_failures += 1;
                    error!(
                        ?state,
                        error = %e,
                        cooldown_secs = self.config.error_cooldown.as_secs(),
                        "Pass failed; retrying after cooldown"
                    );
                    self.config.error_cooldown
                }
            };

            if !sleep_in_slices(wait, self.config.sleep_slice, token).await {
                break;
            }
        }

        info!(
            passes = stats.passes_completed,
            failures = stats.pass_failures,
            "Scheduler stopped"
        );
        stats
    }
}
