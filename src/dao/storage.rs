use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable summary of the failure.
        message: String,
        /// Backend specific cause.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A conditional write kept losing against concurrent writers.
    #[error("storage write contended on `{document}` after {attempts} attempt(s)")]
    Contended {
        /// Identifier of the contended document.
        document: String,
        /// Number of attempts made.
        attempts: u32,
    },
    /// A stored document holds data the domain cannot accept.
    #[error("stored document `{document}` is malformed: {reason}")]
    Malformed {
        /// Identifier of the offending document.
        document: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
