//! HTTP transport used by the session coordinator.
//!
//! The coordinator only needs a single capability from the network: POST a
//! JSON body to a URL, optionally with a bearer token, and get JSON back.
//! That capability is the [`Transport`] trait; [`ApiClient`] is the
//! reqwest-backed implementation.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::{header, Client};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Network capability injected into the session coordinator.
pub trait Transport: Send + Sync {
    /// POST `body` to `url`, authorizing with `bearer` when given.
    ///
    /// An empty response body is returned as `Value::Null`.
    fn post<'a>(
        &'a self,
        url: Url,
        body: Value,
        bearer: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Value, ApiError>>;
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    /// Create a new API client with the default request timeout
    pub fn new() -> Result<Self, ApiError> {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Create a new API client whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn post_json(
        &self,
        url: Url,
        body: Value,
        bearer: Option<&str>,
    ) -> Result<Value, ApiError> {
        debug!(url = %url, authorized = bearer.is_some(), "POST");

        let mut request = self
            .client
            .post(url.clone())
            .header(header::ACCEPT, "application/json")
            .json(&body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = Self::check_response(request.send().await?).await?;
        let text = response.text().await?;
        parse_body(&text)
    }
}

impl Transport for ApiClient {
    fn post<'a>(
        &'a self,
        url: Url,
        body: Value,
        bearer: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Value, ApiError>> {
        self.post_json(url, body, bearer).boxed()
    }
}

/// Parse a successful response body, treating an empty body as `null`.
fn parse_body(text: &str) -> Result<Value, ApiError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
        .map_err(|e| ApiError::InvalidResponse(format!("Response is not JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body_empty_is_null() {
        assert_eq!(parse_body("").unwrap(), Value::Null);
        assert_eq!(parse_body("  \n").unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_body_json() {
        let value = parse_body(r#"{"message":"ok"}"#).unwrap();
        assert_eq!(value, json!({"message": "ok"}));
    }

    #[test]
    fn test_parse_body_rejects_html() {
        let err = parse_body("<html>502</html>").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_client_builds() {
        assert!(ApiClient::with_timeout(Duration::from_secs(5)).is_ok());
    }
}
