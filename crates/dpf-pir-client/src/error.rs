//! Client error types

use dpf_pir_core::StatusKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No indices requested")]
    EmptyQuery,

    #[error("Index out of bounds: {index} not in [0, {size})")]
    IndexOutOfBounds { index: i64, size: u64 },

    #[error("Response mismatch: {0}")]
    ResponseMismatch(String),

    #[error("No request encrypter configured")]
    MissingEncrypter,

    #[error("Client state carries no Helper pad seed")]
    MissingPadSeed,

    #[error("Helper request encryption failed: {0}")]
    Encrypt(String),

    #[error(transparent)]
    Core(#[from] dpf_pir_core::Error),
}

impl ClientError {
    pub fn kind(&self) -> StatusKind {
        match self {
            ClientError::EmptyQuery
            | ClientError::IndexOutOfBounds { .. }
            | ClientError::ResponseMismatch(_)
            | ClientError::MissingPadSeed => StatusKind::InvalidArgument,
            ClientError::MissingEncrypter => StatusKind::FailedPrecondition,
            ClientError::Encrypt(_) => StatusKind::Internal,
            ClientError::Core(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
