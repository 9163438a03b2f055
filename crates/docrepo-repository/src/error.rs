use docrepo_store_core::StoreError;
use thiserror::Error;

/// Errors delivered to repository callbacks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The backing store failed; carried as-is.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Zero-length batch under `EmptyBatchPolicy::Reject`.
    #[error("Empty batch rejected for {operation}")]
    EmptyBatch { operation: &'static str },

    #[error("Entity passed to {operation} has no document reference")]
    MissingReference { operation: &'static str },
}

impl RepositoryError {
    /// The underlying store error, if this error came from the store.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            RepositoryError::Store(err) => Some(err),
            _ => None,
        }
    }
}
