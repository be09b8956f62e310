use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the error means the medium itself refused the operation
    /// (quota exceeded, private browsing, locked database).
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, BridgeError::StorageUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
