use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Command `{program}` exited with {code:?}: {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
        retryable: bool,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether repeating the same call may succeed.
    ///
    /// Missing capabilities, rejections and not-found results are permanent;
    /// command failures carry their own classification.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::OperationFailed(_) | BridgeError::Throttled(_) | BridgeError::Io(_) => {
                true
            }
            BridgeError::CommandFailed { retryable, .. } => *retryable,
            BridgeError::NotAvailable(_) | BridgeError::NotFound(_) | BridgeError::Rejected(_) => {
                false
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
