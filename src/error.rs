//! Error types for upload session operations.
//!
//! Validation rejections are not errors: they come back as
//! [`crate::check::Acceptance`] values. Everything here is either a
//! state-machine violation (fatal, log and stop) or an infrastructure fault.

use crate::entity::upload_session::SessionStatus;
use crate::scan::ScanError;
use crate::storage::StorageError;

/// Errors raised by [`crate::UploadSessionStore`].
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The operation is not allowed while the session is in `status`.
    #[error("upload session {token} is {status}; cannot {operation}")]
    InvalidState {
        token: String,
        status: SessionStatus,
        operation: &'static str,
    },

    /// A status change that the state machine does not allow.
    #[error("upload session {token} cannot move from {from} to {to}")]
    IllegalTransition {
        token: String,
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("upload session {0} not found")]
    SessionNotFound(String),

    #[error("file {name:?} not found in upload session {token}")]
    FileNotFound { token: String, name: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl UploadError {
    pub(crate) fn invalid_state(
        token: &str,
        status: SessionStatus,
        operation: &'static str,
    ) -> Self {
        UploadError::InvalidState {
            token: token.to_string(),
            status,
            operation,
        }
    }

    /// True for errors caused by calling an operation in the wrong state.
    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            UploadError::InvalidState { .. } | UploadError::IllegalTransition { .. }
        )
    }
}

/// Convenience type alias for Results with UploadError.
pub type UploadResult<T> = Result<T, UploadError>;
