use thiserror::Error;

use crate::{env::VarNameErr, event::DecodeError, service::db::StorageError};

/// Why an invocation was aborted
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A required environment variable is not set
    #[error("missing configuration: {0}")]
    MissingConfiguration(#[from] VarNameErr),
    #[error("{0}")]
    Decode(#[from] DecodeError),
    #[error("{0}")]
    Storage(#[from] StorageError),
}
