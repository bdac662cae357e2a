use bridge_traits::error::BridgeError;
use core_ledger::LedgerError;
use thiserror::Error;

/// Process exit status for a configuration failure.
pub const EXIT_CONFIG: u8 = 2;
/// Process exit status when the remote store is unreachable at startup.
pub const EXIT_CONNECTIVITY: u8 = 3;
/// Process exit status for any other bootstrap fault.
pub const EXIT_FAILURE: u8 = 1;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Remote storage unreachable: {0}")]
    Connectivity(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

impl ServiceError {
    /// Exit status the binary reports for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ServiceError::Configuration(_) => EXIT_CONFIG,
            ServiceError::Connectivity(_) => EXIT_CONNECTIVITY,
            ServiceError::Ledger(_)
            | ServiceError::Bridge(_)
            | ServiceError::InitializationFailed(_) => EXIT_FAILURE,
        }
    }
}

impl From<core_runtime::Error> for ServiceError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::Config(message) => ServiceError::Configuration(message),
            core_runtime::Error::Internal(message) => ServiceError::InitializationFailed(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
