use thiserror::Error;

use eafoods_core::DomainError;
use eafoods_events::EnvelopeError;

/// Storage failure.
///
/// These are infrastructure errors, as opposed to domain rejections.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness violation (duplicate product name, duplicate slot, ...).
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// History payload could not be encoded or decoded.
    #[error("history encoding failed: {0}")]
    Encoding(#[from] EnvelopeError),

    /// Connection, query or transaction failure in the backend.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Error returned by the application services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Store(_) => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
