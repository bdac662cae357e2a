//! Error types for the rclone provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// rclone exit status for syntax or usage errors.
pub const EXIT_USAGE: i32 = 1;

/// rclone exit status for uncategorised errors.
pub const EXIT_UNCATEGORISED: i32 = 2;

/// rclone exit status when the directory does not exist.
pub const EXIT_DIR_NOT_FOUND: i32 = 3;

/// rclone exit status for a fatal error that more retries won't fix.
pub const EXIT_FATAL: i32 = 7;

#[derive(Error, Debug)]
pub enum RcloneError {
    /// rclone ran but exited unsuccessfully
    #[error("rclone {command} exited with {code:?}: {stderr}")]
    ExitFailure {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Output could not be parsed
    #[error("Failed to parse rclone output: {0}")]
    ParseError(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, RcloneError>;

impl RcloneError {
    /// Usage, uncategorised and fatal errors repeat on every attempt;
    /// everything else (network, rate limits, killed process) may clear up.
    pub fn is_retryable(&self) -> bool {
        match self {
            RcloneError::ExitFailure { code, .. } => {
                !matches!(
                    code,
                    Some(EXIT_USAGE) | Some(EXIT_UNCATEGORISED) | Some(EXIT_FATAL)
                )
            }
            RcloneError::ParseError(_) => false,
            RcloneError::Bridge(e) => e.is_retryable(),
        }
    }
}

impl From<RcloneError> for BridgeError {
    fn from(error: RcloneError) -> Self {
        let retryable = error.is_retryable();
        match error {
            RcloneError::ExitFailure {
                command,
                code,
                stderr,
            } => BridgeError::CommandFailed {
                program: format!("rclone {}", command),
                code,
                stderr,
                retryable,
            },
            RcloneError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("rclone output: {}", msg))
            }
            RcloneError::Bridge(e) => e,
        }
    }
}
