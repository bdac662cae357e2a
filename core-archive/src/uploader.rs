//! Uploader
//!
//! Moves a fetched file into the remote store:
//!
//! 1. ensure the remote directory exists (retried once)
//! 2. skip when an object of the same size is already there and overwrite is off
//! 3. transfer, retried with jittered backoff
//! 4. optionally verify the remote size
//!
//! Ordinary failures come back inside [`UploadResult`]; only contract
//! violations are returned as `Err`.

use bridge_traits::remote::{join_remote, RemoteStore};
use core_async::fs;
use core_async::sync::CancellationToken;
use core_async::time::sleep_or_cancel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::retry::BackoffPolicy;
use crate::{ArchiveError, Result};

#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Transfer retries after the first attempt
    pub max_retries: u32,
    /// Replace a same-size remote object instead of skipping the transfer
    pub overwrite: bool,
    /// Compare remote and local sizes after the transfer
    pub verify: bool,
    pub backoff: BackoffPolicy,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            overwrite: false,
            verify: true,
            backoff: BackoffPolicy::upload_default(),
        }
    }
}

/// Classified reason an upload did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadFailure {
    /// The local file is missing or unreadable; no transfer was attempted.
    LocalFileUnavailable(String),
    /// Every transfer attempt failed.
    Exhausted(String),
    /// The store rejected the request in a way retrying cannot fix.
    NonRetryable(String),
    /// Shutdown was requested between attempts.
    Cancelled,
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadFailure::LocalFileUnavailable(msg) => write!(f, "local file unavailable: {}", msg),
            UploadFailure::Exhausted(msg) => write!(f, "retries exhausted: {}", msg),
            UploadFailure::NonRetryable(msg) => write!(f, "non-retryable: {}", msg),
            UploadFailure::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    /// Resolved destination, e.g. `remote:base/2024/name [id].mp4`
    pub remote_path: String,
    pub bytes_transferred: u64,
    /// Transfer attempts beyond the first
    pub retries: u32,
    /// `Some(true)` when the remote size matched, `None` when not checked
    pub verified: Option<bool>,
    pub skipped_existing: bool,
    pub failure: Option<UploadFailure>,
}

impl UploadResult {
    fn succeeded(remote_path: String, bytes: u64, retries: u32, verified: Option<bool>) -> Self {
        Self {
            success: true,
            remote_path,
            bytes_transferred: bytes,
            retries,
            verified,
            skipped_existing: false,
            failure: None,
        }
    }

    fn failed(remote_path: String, retries: u32, failure: UploadFailure) -> Self {
        Self {
            success: false,
            remote_path,
            bytes_transferred: 0,
            retries,
            verified: None,
            skipped_existing: false,
            failure: Some(failure),
        }
    }
}

pub struct Uploader {
    store: Arc<dyn RemoteStore>,
    config: UploaderConfig,
}

impl Uploader {
    pub fn new(store: Arc<dyn RemoteStore>, config: UploaderConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Uploads `local_path` into the directory `remote_subpath`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidArgument`] if `local_path` has no file
    /// name or `remote_subpath` is absolute or contains `..`.
    #[instrument(skip(self, local_path, token), fields(file = %local_path.display()))]
    pub async fn upload(
        &self,
        local_path: &Path,
        remote_subpath: &str,
        token: &CancellationToken,
    ) -> Result<UploadResult> {
        let file_name = validate_arguments(local_path, remote_subpath)?;
        let relative_file = join_remote(&[remote_subpath, file_name]);
        let remote_path = self.store.resolve(&relative_file);

        let local_size = match fs::metadata(local_path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => {
                return Ok(UploadResult::failed(
                    remote_path,
                    0,
                    UploadFailure::LocalFileUnavailable("not a regular file".to_string()),
                ))
            }
            Err(e) => {
                warn!(error = %e, "Local file unavailable");
                return Ok(UploadResult::failed(
                    remote_path,
                    0,
                    UploadFailure::LocalFileUnavailable(e.to_string()),
                ));
            }
        };

        if let Err(failure) = self.ensure_directory(remote_subpath).await {
            return Ok(UploadResult::failed(remote_path, 0, failure));
        }

        if !self.config.overwrite {
            match self.store.stat_remote_file(&relative_file).await {
                Ok(Some(existing)) if existing.size == local_size => {
                    info!(%remote_path, "Remote copy with identical size exists, skipping transfer");
                    let verified = self.config.verify.then_some(true);
                    let mut result = UploadResult::succeeded(remote_path, 0, 0, verified);
                    result.skipped_existing = true;
                    return Ok(result);
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Pre-transfer stat failed, uploading anyway"),
            }
        }

        let max_retries = self.config.max_retries;
        let mut last_error = String::new();

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = self.config.backoff.jittered_delay(attempt);
                debug!(attempt, ?delay, "Waiting before next transfer attempt");
                if !sleep_or_cancel(delay, token).await {
                    return Ok(UploadResult::failed(
                        remote_path,
                        attempt - 1,
                        UploadFailure::Cancelled,
                    ));
                }
            }

            if let Err(e) = self.store.upload_file(local_path, remote_subpath).await {
                if !e.is_retryable() {
                    warn!(attempt, error = %e, "Transfer failed permanently");
                    return Ok(UploadResult::failed(
                        remote_path,
                        attempt,
                        UploadFailure::NonRetryable(e.to_string()),
                    ));
                }
                warn!(attempt, max_retries, error = %e, "Transfer attempt failed");
                last_error = e.to_string();
                continue;
            }

            if !self.config.verify {
                info!(%remote_path, bytes = local_size, "Uploaded");
                return Ok(UploadResult::succeeded(remote_path, local_size, attempt, None));
            }

            match self.store.stat_remote_file(&relative_file).await {
                Ok(Some(remote)) if remote.size == local_size => {
                    info!(%remote_path, bytes = local_size, "Uploaded and verified");
                    return Ok(UploadResult::succeeded(
                        remote_path,
                        local_size,
                        attempt,
                        Some(true),
                    ));
                }
                Ok(Some(remote)) => {
                    warn!(
                        attempt,
                        local = local_size,
                        remote = remote.size,
                        "Remote size mismatch after transfer"
                    );
                    last_error = format!(
                        "size mismatch: local {} bytes, remote {} bytes",
                        local_size, remote.size
                    );
                }
                Ok(None) => {
                    warn!(attempt, "Remote object missing after transfer");
                    last_error = "remote object missing after transfer".to_string();
                }
                Err(e) => {
                    warn!(error = %e, "Could not verify upload");
                    return Ok(UploadResult::succeeded(remote_path, local_size, attempt, None));
                }
            }
        }

        Ok(UploadResult::failed(
            remote_path,
            max_retries,
            UploadFailure::Exhausted(last_error),
        ))
    }

    /// mkdir with one retry. Failure here means the destination is unusable.
    async fn ensure_directory(&self, remote_subpath: &str) -> std::result::Result<(), UploadFailure> {
        let first = match self.store.ensure_path_exists(remote_subpath).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        debug!(error = %first, "Creating remote directory failed, retrying once");

        self.store
            .ensure_path_exists(remote_subpath)
            .await
            .map_err(|e| {
                warn!(error = %e, "Cannot create remote directory");
                UploadFailure::NonRetryable(format!("cannot create {}: {}", remote_subpath, e))
            })
    }
}

fn validate_arguments<'a>(local_path: &'a Path, remote_subpath: &str) -> Result<&'a str> {
    let file_name = local_path
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ArchiveError::InvalidArgument(format!(
                "{} has no usable file name",
                local_path.display()
            ))
        })?;

    let subpath = Path::new(remote_subpath);
    if remote_subpath.starts_with('/') || subpath.is_absolute() {
        return Err(ArchiveError::InvalidArgument(format!(
            "remote subpath '{}' must be relative",
            remote_subpath
        )));
    }
    if subpath.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ArchiveError::InvalidArgument(format!(
            "remote subpath '{}' must not contain '..'",
            remote_subpath
        )));
    }

    Ok(file_name)
}
