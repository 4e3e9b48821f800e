//! Mapping of lifecycle errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::str::FromStr;
use tracing::error;
use warden_core::{
    ChannelError, ConfigStoreError, ErrorKind, LifecycleError, TicketError, TranscriptError,
};

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

/// Error returned by every API handler.
#[derive(Debug)]
pub struct ApiError(pub LifecycleError);

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self(LifecycleError::Validation(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self(LifecycleError::NotFound(message.into()))
    }
}

macro_rules! from_error {
    ($($error:ty),+) => {
        $(
            impl From<$error> for ApiError {
                fn from(e: $error) -> Self {
                    Self(e.into())
                }
            }
        )+
    };
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        Self(e)
    }
}

from_error!(ChannelError, ConfigStoreError, TicketError, TranscriptError);

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::External => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        if kind == ErrorKind::Internal {
            error!(error = %self.0, "Internal error while handling request");
        }

        (
            status_for(kind),
            Json(ErrorResponse {
                error: self.0.to_string(),
                kind,
            }),
        )
            .into_response()
    }
}

/// Parse a path segment, answering 400 when it is malformed.
pub fn parse_path<T: FromStr>(what: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::validation(format!("invalid {}: '{}'", what, raw)))
}
