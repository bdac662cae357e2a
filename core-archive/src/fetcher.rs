//! Fetcher
//!
//! Materializes one catalog item in the local work directory. A successful
//! fetch always points at an existing, non-empty file; anything less counts
//! as a failed attempt.

use bridge_traits::media::{CatalogItem, DownloadRequest, MediaDownloader};
use core_async::fs;
use core_async::sync::CancellationToken;
use core_async::time::sleep_or_cancel;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::naming::output_stem;
use crate::retry::BackoffPolicy;
use crate::{ArchiveError, Result};

/// Suffixes of intermediate files left behind by an interrupted download.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp", ".tmp"];

pub struct Fetcher {
    downloader: Arc<dyn MediaDownloader>,
    format: String,
    max_retries: u32,
    backoff: BackoffPolicy,
}

impl Fetcher {
    /// `format` is the downloader's format selector; `max_retries` retries
    /// follow the first attempt.
    pub fn new(
        downloader: Arc<dyn MediaDownloader>,
        format: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            downloader,
            format: format.into(),
            max_retries,
            backoff: BackoffPolicy::fetch_default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Downloads `item` into `destination_dir`.
    ///
    /// # Errors
    ///
    /// - [`ArchiveError::Cancelled`] if the token is set before an attempt or
    ///   during a backoff sleep
    /// - [`ArchiveError::NonRetryableCommand`] on a permanent downloader error
    /// - [`ArchiveError::TransientFetch`] once every attempt has failed
    ///
    /// Partial artifacts are removed on every error path.
    #[instrument(skip(self, item, destination_dir, token), fields(item_id = %item.id))]
    pub async fn fetch(
        &self,
        item: &CatalogItem,
        destination_dir: &Path,
        token: &CancellationToken,
    ) -> Result<PathBuf> {
        let stem = output_stem(item);
        let request = DownloadRequest {
            item_id: item.id.clone(),
            output_stem: stem.clone(),
            destination_dir: destination_dir.to_path_buf(),
            format: self.format.clone(),
        };

        let total_attempts = self.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=total_attempts {
            if attempt > 1 {
                let delay = self.backoff.delay_for(attempt);
                debug!(attempt, ?delay, "Waiting before next fetch attempt");
                if !sleep_or_cancel(delay, token).await {
                    cleanup_partials(destination_dir, &stem).await;
                    return Err(ArchiveError::Cancelled);
                }
            }
            if token.is_cancelled() {
                cleanup_partials(destination_dir, &stem).await;
                return Err(ArchiveError::Cancelled);
            }

            match self.downloader.download(&request).await {
                Ok(path) => match complete_file_size(&path).await {
                    Some(size) => {
                        info!(attempt, bytes = size, path = %path.display(), "Fetched item");
                        return Ok(path);
                    }
                    None => {
                        warn!(
                            attempt,
                            path = %path.display(),
                            "Downloader reported a missing or empty file"
                        );
                        fs::remove_file(&path).await.ok();
                        last_error = format!("{} is missing or empty", path.display());
                    }
                },
                Err(e) if !e.is_retryable() => {
                    warn!(attempt, error = %e, "Fetch failed permanently");
                    cleanup_partials(destination_dir, &stem).await;
                    return Err(ArchiveError::NonRetryableCommand(e.to_string()));
                }
                Err(e) => {
                    warn!(attempt, max_attempts = total_attempts, error = %e, "Fetch attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        cleanup_partials(destination_dir, &stem).await;
        Err(ArchiveError::TransientFetch {
            item_id: item.id.clone(),
            attempts: total_attempts,
            message: last_error,
        })
    }
}

async fn complete_file_size(path: &Path) -> Option<u64> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(meta.len()),
        _ => None,
    }
}

/// Best-effort removal of `{stem}*.part|.ytdl|.temp|.tmp` in `dir`.
async fn cleanup_partials(dir: &Path, stem: &str) {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return,
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(stem) && PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            match fs::remove_file(entry.path()).await {
                Ok(()) => debug!(file = name, "Removed partial download"),
                Err(e) => warn!(file = name, error = %e, "Could not remove partial download"),
            }
        }
    }
}
