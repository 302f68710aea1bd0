//! Error types for modelmap core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in modelmap core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] modelmap_storage::StorageError),

    /// A commit-log record could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// The commit log is corrupted.
    #[error("commit log corruption at offset {offset}: {message}")]
    LogCorruption {
        /// Offset of the offending frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A flush found an entity that breaks a structural invariant.
    #[error("integrity violation on {entity}: {message}")]
    IntegrityViolation {
        /// Description of the offending entity.
        entity: String,
        /// What was wrong with it.
        message: String,
    },

    /// The session has been closed.
    #[error("session {session} is closed")]
    SessionClosed {
        /// Identifier of the closed session.
        session: String,
    },

    /// A model required by the mapping is missing from the catalog.
    #[error("model not found in catalog: {name}")]
    MissingModel {
        /// Name of the missing model.
        name: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a commit log corruption error.
    pub fn log_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::LogCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates an integrity violation error.
    pub fn integrity_violation(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IntegrityViolation {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors raised by strict-mode flush validation.
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::IntegrityViolation { .. })
    }
}
