//! Failures talking to the authentication service.
//!
//! Every [`Transport`](super::Transport) call reports one of these. The
//! session coordinator treats any of them during a refresh as a failed
//! refresh and drops to anonymous.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Cap on how much of a response body is kept in an error
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum ApiError {
    /// 401: the token or credentials were not accepted
    #[error("Server rejected credentials")]
    Unauthorized,

    /// 403
    #[error("Forbidden: {0}")]
    AccessDenied(String),

    /// 404, usually a base URL pointing at the wrong service
    #[error("Endpoint not found: {0}")]
    NotFound(String),

    /// 429
    #[error("Too many requests to the auth service")]
    RateLimited,

    /// 5xx
    #[error("Auth service failed: {0}")]
    ServerError(String),

    #[error("Could not reach the auth service: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Any other status, or a body that is not the expected JSON
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("No response within {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    /// Map a non-success status and its body to an error.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = truncate_body(body);
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::AccessDenied(body),
            StatusCode::NOT_FOUND => Self::NotFound(body),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            s if s.is_server_error() => Self::ServerError(body),
            s => Self::InvalidResponse(format!("{s}: {body}")),
        }
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &body[..end], body.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_known_codes() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, "nope"),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        match ApiError::from_status(StatusCode::FORBIDDEN, "locked") {
            ApiError::AccessDenied(body) => assert_eq!(body, "locked"),
            other => panic!("unexpected error: {other:?}"),
        }
        match ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream") {
            ApiError::ServerError(body) => assert_eq!(body, "upstream"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_status_unknown_code_keeps_status() {
        match ApiError::from_status(StatusCode::BAD_REQUEST, "missing email") {
            ApiError::InvalidResponse(msg) => {
                assert!(msg.contains("400"));
                assert!(msg.contains("missing email"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_long_bodies_are_cut_on_a_char_boundary() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let cut = truncate_body(&long);
        assert!(cut.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(cut.ends_with("(520 bytes)"));

        // two-byte chars straddling the limit
        let wide = format!("x{}", "é".repeat(MAX_ERROR_BODY_LENGTH));
        let cut = truncate_body(&wide);
        assert!(cut.starts_with('x'));
        assert!(cut.ends_with(&format!("({} bytes)", wide.len())));

        assert_eq!(truncate_body("short"), "short");
    }
}
