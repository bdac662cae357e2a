//! Error types for the YouTube provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// YouTube provider errors
#[derive(Error, Debug)]
pub enum YouTubeError {
    /// API request returned an error status
    #[error("YouTube API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Quota exhausted or request throttled
    #[error("YouTube quota exceeded or throttled: {0}")]
    QuotaExceeded(String),

    /// The channel or its uploads playlist does not exist
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// The channel reference cannot be used with this source
    #[error("Unsupported channel reference: {0}")]
    UnsupportedChannelRef(String),

    /// Failed to parse API or extractor output
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// yt-dlp exited unsuccessfully
    #[error("yt-dlp exited with {code:?}: {message}")]
    ExtractorFailed {
        code: Option<i32>,
        message: String,
        retryable: bool,
    },

    /// Bridge error
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for YouTube operations
pub type Result<T> = std::result::Result<T, YouTubeError>;

impl From<YouTubeError> for BridgeError {
    fn from(error: YouTubeError) -> Self {
        match error {
            YouTubeError::ApiError {
                status_code,
                message,
            } if status_code >= 500 => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            YouTubeError::ApiError {
                status_code,
                message,
            } => BridgeError::Rejected(format!("API error (status {}): {}", status_code, message)),
            YouTubeError::QuotaExceeded(msg) => BridgeError::Throttled(msg),
            YouTubeError::ChannelNotFound(msg) => BridgeError::NotFound(msg),
            YouTubeError::UnsupportedChannelRef(msg) => BridgeError::Rejected(msg),
            YouTubeError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            YouTubeError::ExtractorFailed {
                code,
                message,
                retryable,
            } => BridgeError::CommandFailed {
                program: "yt-dlp".to_string(),
                code,
                stderr: message,
                retryable,
            },
            YouTubeError::Bridge(e) => e,
        }
    }
}
