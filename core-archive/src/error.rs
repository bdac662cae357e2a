use core_ledger::LedgerError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Fetch of {item_id} failed after {attempts} attempts: {message}")]
    TransientFetch {
        item_id: String,
        attempts: u32,
        message: String,
    },

    #[error("Upload failed after {attempts} attempts: {message}")]
    TransientUpload { attempts: u32, message: String },

    #[error("Non-retryable command failure: {0}")]
    NonRetryableCommand(String),

    #[error("Local file unavailable: {path}: {message}")]
    LocalFileUnavailable { path: PathBuf, message: String },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
