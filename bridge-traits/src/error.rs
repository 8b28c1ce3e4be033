use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Seek failed: {0}")]
    SeekFailed(String),

    #[error("Stream position unavailable: {0}")]
    TellFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the host simply lacks the capability (read-only
    /// handle, non-seekable stream) rather than failing mid-operation.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, BridgeError::NotAvailable(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
