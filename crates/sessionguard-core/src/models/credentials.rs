use serde::{Deserialize, Serialize};

/// An access token and the refresh token issued alongside it.
///
/// A pair is replaced as a whole; there is no partial update. Absence of a
/// session is `Option::<CredentialPair>::None`, never a pair with empty fields.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    #[serde(rename = "token", alias = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Both tokens are non-empty
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

// Tokens are bearer secrets; keep them out of debug output and logs.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Body of the refresh-token request
#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    pub refresh_token: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_wire_format() {
        let pair: CredentialPair =
            serde_json::from_value(json!({"token": "a.b.c", "refreshToken": "r1"})).unwrap();
        assert_eq!(pair, CredentialPair::new("a.b.c", "r1"));
    }

    #[test]
    fn test_deserialize_access_token_alias() {
        let pair: CredentialPair =
            serde_json::from_value(json!({"accessToken": "a.b.c", "refreshToken": "r1"}))
                .unwrap();
        assert_eq!(pair.access_token, "a.b.c");
    }

    #[test]
    fn test_missing_refresh_token_is_rejected() {
        let result: Result<CredentialPair, _> = serde_json::from_value(json!({"token": "a.b.c"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_is_complete() {
        assert!(CredentialPair::new("a", "r").is_complete());
        assert!(!CredentialPair::new("", "r").is_complete());
        assert!(!CredentialPair::new("a", "").is_complete());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let debug = format!("{:?}", CredentialPair::new("secret-access", "secret-refresh"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_refresh_request_body() {
        let body = serde_json::to_value(RefreshRequest { refresh_token: "r1" }).unwrap();
        assert_eq!(body, json!({"refreshToken": "r1"}));
    }
}
