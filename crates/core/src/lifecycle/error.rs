//! Errors surfaced by lifecycle operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::ChannelError;
use crate::guild_config::ConfigStoreError;
use crate::ticket::TicketError;
use crate::transcript::TranscriptError;

/// Broad category of a [`LifecycleError`], used for HTTP status mapping
/// and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    PermissionDenied,
    External,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::External => "external",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Error returned by every engine operation.
///
/// Validation, Conflict, NotFound and PermissionDenied are raised before
/// any state changes.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("external service error: {0}")]
    External(#[from] ChannelError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Validation(_) => ErrorKind::Validation,
            LifecycleError::Conflict(_) => ErrorKind::Conflict,
            LifecycleError::NotFound(_) => ErrorKind::NotFound,
            LifecycleError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            LifecycleError::External(_) => ErrorKind::External,
            LifecycleError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<TicketError> for LifecycleError {
    fn from(e: TicketError) -> Self {
        match e {
            TicketError::NotFound(_) => LifecycleError::NotFound(e.to_string()),
            TicketError::Database(msg) => LifecycleError::Internal(msg),
            other => LifecycleError::Conflict(other.to_string()),
        }
    }
}

impl From<ConfigStoreError> for LifecycleError {
    fn from(e: ConfigStoreError) -> Self {
        match e {
            ConfigStoreError::NotFound(_) => LifecycleError::NotFound(e.to_string()),
            ConfigStoreError::Validation(msg) => LifecycleError::Validation(msg),
            ConfigStoreError::Database(msg) => LifecycleError::Internal(msg),
        }
    }
}

impl From<TranscriptError> for LifecycleError {
    fn from(e: TranscriptError) -> Self {
        match e {
            TranscriptError::NotFound(_) => LifecycleError::NotFound(e.to_string()),
            TranscriptError::InvalidPointer(_) => LifecycleError::Validation(e.to_string()),
            TranscriptError::Io { .. } => LifecycleError::Internal(e.to_string()),
        }
    }
}
