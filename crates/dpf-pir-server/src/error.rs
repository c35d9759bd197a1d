//! Server error types

use dpf_pir_core::StatusKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Server not ready: {0}")]
    NotReady(String),

    #[error("Config mismatch: {field} - config says {config_value}, database has {actual_value}")]
    ConfigMismatch {
        field: String,
        config_value: String,
        actual_value: String,
    },

    #[error("Record index out of bounds: {index} >= {capacity}")]
    IndexOutOfBounds { index: usize, capacity: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Item size mismatch: expected {expected} bytes, got {actual}")]
    ItemSize { expected: usize, actual: usize },

    #[error("Item {id} names buckets that do not match its sequence number")]
    BucketMismatch { id: u64 },

    #[error("Cuckoo table full: item {displaced} has no slot left")]
    TableFull { displaced: u64 },

    #[error("Helper forwarding failed: {0}")]
    Forward(String),

    #[error("Helper request decryption failed: {0}")]
    Decrypt(String),

    #[error(transparent)]
    Core(#[from] dpf_pir_core::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn kind(&self) -> StatusKind {
        match self {
            ServerError::NotReady(_) => StatusKind::FailedPrecondition,
            ServerError::ConfigMismatch { .. }
            | ServerError::IndexOutOfBounds { .. }
            | ServerError::InvalidArgument(_)
            | ServerError::ItemSize { .. }
            | ServerError::BucketMismatch { .. } => StatusKind::InvalidArgument,
            ServerError::TableFull { .. } => StatusKind::ResourceExhausted,
            ServerError::Forward(_) | ServerError::Decrypt(_) | ServerError::Internal(_) => {
                StatusKind::Internal
            }
            ServerError::Core(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
