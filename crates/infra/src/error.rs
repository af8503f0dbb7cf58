use thiserror::Error;

use stockflow_core::DomainError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned by stores and the services built on them.
///
/// `Domain` carries the deterministic business failures (not found, insufficient
/// stock, invalid transition, conflicts). `Storage` is infrastructure trouble
/// (connection loss, unexpected rows) and sits outside the domain taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure in {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    /// The domain failure, if this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(e) => Some(e),
            Self::Storage { .. } => None,
        }
    }
}
