use thiserror::Error;

use crate::api::ApiError;

/// Errors surfaced by the session coordinator and token codec.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SessionError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("No session - log in first")]
    NoSession,

    #[error(transparent)]
    Transport(#[from] ApiError),

    #[error("Request body could not be serialized: {0}")]
    InvalidRequest(String),

    #[error("Unexpected response body: {0}")]
    InvalidResponse(String),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl SessionError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        SessionError::MalformedToken(reason.into())
    }
}
