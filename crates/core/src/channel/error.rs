//! Error types for channel operations.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by the chat platform collaborators.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// The channel, member or message does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The bot lacks the permission for this action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The platform asked us to slow down.
    #[error("Rate limited{}", .retry_after.map(|d| format!(", retry after {:.1}s", d.as_secs_f64())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// The request never got a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The platform rejected the request.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

impl ChannelError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotFound(_) | Self::Forbidden(_) => false,
        }
    }

    /// Delay requested by the platform, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
