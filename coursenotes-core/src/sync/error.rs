use thiserror::Error;

use crate::address::ResourceAddress;
use crate::api::ApiError;

/// Errors surfaced by [`SyncController`](super::SyncController) operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The address does not resolve in the loaded snapshot.
    #[error("Item not found: {0}")]
    NotFound(ResourceAddress),

    /// A newer `load` superseded this one.
    #[error("Load superseded by a newer page load")]
    Cancelled,

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The patch would leave the entity in an invalid shape.
    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    #[error("Unexpected response from server: {0}")]
    Decode(String),
}

impl SyncError {
    /// Silent errors are never shown to the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    /// User-facing messages, one per notification.
    pub fn messages(&self) -> Vec<String> {
        match self {
            SyncError::Api(e) => e.messages(),
            SyncError::NotFound(_) => vec!["Item not found".to_string()],
            SyncError::Cancelled => Vec::new(),
            other => vec![other.to_string()],
        }
    }
}
