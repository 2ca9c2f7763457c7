use thiserror::Error;

use lms_core::DomainError;

/// Storage-level failure.
///
/// `NotFound`, `Conflict` and `OwnershipChanged` are operational and carry a
/// caller-facing message. `Backend` is everything else.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// The ownership chain no longer admits the writer at commit time.
    #[error("{0}")]
    OwnershipChanged(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
