//! Error types for dpf-pir-core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error category shared by every crate in the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    InvalidArgument,
    FailedPrecondition,
    ResourceExhausted,
    Internal,
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusKind::InvalidArgument => write!(f, "invalid_argument"),
            StatusKind::FailedPrecondition => write!(f, "failed_precondition"),
            StatusKind::ResourceExhausted => write!(f, "resource_exhausted"),
            StatusKind::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Index out of bounds: {index} not in [0, {max})")]
    IndexOutOfBounds { index: i64, max: u64 },

    #[error("Wire version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u16, actual: u16 },

    #[error("Malformed message: {0}")]
    Decode(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> StatusKind {
        match self {
            Error::InvalidArgument(_)
            | Error::IndexOutOfBounds { .. }
            | Error::VersionMismatch { .. }
            | Error::Decode(_)
            | Error::Json(_) => StatusKind::InvalidArgument,
            Error::FailedPrecondition(_) => StatusKind::FailedPrecondition,
            Error::ResourceExhausted(_) => StatusKind::ResourceExhausted,
            Error::Io(_) | Error::Internal(_) => StatusKind::Internal,
        }
    }
}

/// Reserve `additional` slots or report the allocation failure as ResourceExhausted
pub(crate) fn try_reserve<T>(buf: &mut Vec<T>, additional: usize, what: &str) -> crate::Result<()> {
    buf.try_reserve_exact(additional).map_err(|e| {
        Error::ResourceExhausted(format!(
            "cannot allocate {} ({} elements): {}",
            what, additional, e
        ))
    })
}
