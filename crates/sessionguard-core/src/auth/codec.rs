//! Access token payload decoding and expiry checks.
//!
//! Tokens are three dot-separated base64url segments; only the middle one
//! (the claims payload) is read. Signatures are not verified: the server
//! that issued the token is the one that checks it.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use crate::error::SessionError;

/// Standard alphabet, padding optional, non-zero trailing bits ignored.
/// Payloads are mapped from the URL-safe alphabet before decoding, so
/// segments mixing `-`/`_` with `+`/`/` are both accepted.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Claims payload of an access token.
///
/// Always derived from the current access token; never persisted on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedIdentity {
    claims: Map<String, Value>,
}

impl DecodedIdentity {
    /// Gets a claim value by key.
    pub fn claim(&self, key: &str) -> Option<&Value> {
        self.claims.get(key)
    }

    /// The `sub` claim, if it is a string
    pub fn subject(&self) -> Option<&str> {
        self.claim("sub").and_then(Value::as_str)
    }

    /// Expiry instant from the `exp` claim.
    ///
    /// `Ok(None)` when the token carries no `exp`.
    pub fn expires_at(&self) -> Result<Option<DateTime<Utc>>, SessionError> {
        let Some(exp) = self.claim("exp") else {
            return Ok(None);
        };
        let seconds = exp
            .as_f64()
            .ok_or_else(|| SessionError::malformed("exp claim is not a number"))?;
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * 1e9) as u32;
        DateTime::from_timestamp(whole as i64, nanos)
            .map(Some)
            .ok_or_else(|| SessionError::malformed("exp claim is out of range"))
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// The claims as a JSON object
    pub fn as_json(&self) -> Value {
        Value::Object(self.claims.clone())
    }
}

pub struct TokenCodec;

impl TokenCodec {
    /// Decode the claims payload of a three-segment token.
    pub fn decode(token: &str) -> Result<DecodedIdentity, SessionError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(SessionError::malformed(format!(
                "expected 3 segments, got {}",
                parts.len()
            )));
        }

        let payload = parts[1];
        if payload.len() % 4 == 1 {
            return Err(SessionError::malformed("illegal base64url length"));
        }
        let standard: String = payload
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                other => other,
            })
            .collect();
        let bytes = PAYLOAD_ENGINE
            .decode(standard)
            .map_err(|e| SessionError::malformed(format!("payload is not base64url: {e}")))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| SessionError::malformed("payload is not UTF-8"))?;

        match serde_json::from_str(&text) {
            Ok(Value::Object(claims)) => Ok(DecodedIdentity { claims }),
            Ok(_) => Err(SessionError::malformed("payload is not a JSON object")),
            Err(e) => Err(SessionError::malformed(format!("payload is not JSON: {e}"))),
        }
    }

    /// Whether the token expires within `skew_secs` from now.
    ///
    /// A token without an `exp` claim never expires.
    pub fn is_expired(token: &str, skew_secs: i64) -> Result<bool, SessionError> {
        Self::is_expired_at(token, skew_secs, Utc::now())
    }

    /// Same as [`TokenCodec::is_expired`] against an explicit clock.
    pub fn is_expired_at(
        token: &str,
        skew_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, SessionError> {
        let Some(expiry) = Self::decode(token)?.expires_at()? else {
            return Ok(false);
        };
        match Duration::try_seconds(skew_secs).and_then(|skew| now.checked_add_signed(skew)) {
            Some(deadline) => Ok(expiry <= deadline),
            // Skew beyond the representable range
            None => Ok(skew_secs > 0),
        }
    }
}

/// Build an unsigned token around `claims`. Test helper shared across modules.
#[cfg(test)]
pub(crate) fn encode_for_test(claims: &Value) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_round_trip() {
        let claims = json!({"sub": "user-1", "email": "a@b.c", "roles": ["admin"], "exp": 1700000000});
        let identity = TokenCodec::decode(&encode_for_test(&claims)).unwrap();
        assert_eq!(identity.as_json(), claims);
        assert_eq!(identity.subject(), Some("user-1"));
    }

    #[test]
    fn test_decode_accepts_padded_and_url_safe_payloads() {
        let claims = json!({"name": "ÿÿÿ~~~"});
        let raw = claims.to_string();
        let padded = base64::engine::general_purpose::URL_SAFE.encode(&raw);
        let token = format!("h.{padded}.s");
        assert_eq!(TokenCodec::decode(&token).unwrap().as_json(), claims);
    }

    #[test]
    fn test_decode_accepts_standard_alphabet_payload() {
        // `?` and `>` encode to `/` and `+` in the standard alphabet
        let token = "h.eyJzdWIiOiI/Pz8+Pj4iLCJuIjoiw7/DvyJ9.s";
        let identity = TokenCodec::decode(token).unwrap();
        assert_eq!(identity.as_json(), json!({"sub": "???>>>", "n": "ÿÿ"}));

        let url_safe = token.replace('/', "_").replace('+', "-");
        assert_eq!(TokenCodec::decode(&url_safe).unwrap(), identity);
    }

    #[test]
    fn test_decode_ignores_trailing_bits() {
        // `{"a":1}` is `eyJhIjoxfQ`; the final `R` sets a bit past the last byte
        let identity = TokenCodec::decode("h.eyJhIjoxfR.s").unwrap();
        assert_eq!(identity.as_json(), json!({"a": 1}));
    }

    #[test]
    fn test_decode_wrong_segment_count() {
        for token in ["", "abc", "a.b", "a.b.c.d"] {
            assert!(
                matches!(TokenCodec::decode(token), Err(SessionError::MalformedToken(_))),
                "token {token:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_decode_illegal_length() {
        // 5 characters: remainder 1 cannot be padded
        let err = TokenCodec::decode("h.abcde.s").unwrap_err();
        assert!(matches!(err, SessionError::MalformedToken(msg) if msg.contains("length")));
    }

    #[test]
    fn test_decode_not_base64_or_not_json() {
        assert!(matches!(
            TokenCodec::decode("h.!!!!.s"),
            Err(SessionError::MalformedToken(_))
        ));

        let not_json = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode("hello");
        assert!(matches!(
            TokenCodec::decode(&format!("h.{not_json}.s")),
            Err(SessionError::MalformedToken(_))
        ));

        let array = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode("[1,2]");
        assert!(matches!(
            TokenCodec::decode(&format!("h.{array}.s")),
            Err(SessionError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_no_exp_never_expires() {
        let token = encode_for_test(&json!({"sub": "user-1"}));
        for skew in [0, 60, 3600, i32::MAX as i64] {
            assert!(!TokenCodec::is_expired(&token, skew).unwrap());
        }
    }

    #[test]
    fn test_expired_in_past() {
        let now = Utc::now();
        let token = encode_for_test(&json!({"exp": now.timestamp() - 10}));
        assert!(TokenCodec::is_expired(&token, 0).unwrap());
    }

    #[test]
    fn test_not_expired_in_future() {
        let now = Utc::now();
        let token = encode_for_test(&json!({"exp": now.timestamp() + 3600}));
        assert!(!TokenCodec::is_expired(&token, 0).unwrap());
        assert!(!TokenCodec::is_expired(&token, 60).unwrap());
    }

    #[test]
    fn test_skew_moves_the_boundary() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = encode_for_test(&json!({"exp": 1_700_000_030}));
        assert!(!TokenCodec::is_expired_at(&token, 0, now).unwrap());
        assert!(!TokenCodec::is_expired_at(&token, 29, now).unwrap());
        // exp <= now + skew counts as expired
        assert!(TokenCodec::is_expired_at(&token, 30, now).unwrap());
        assert!(TokenCodec::is_expired_at(&token, 31, now).unwrap());
    }

    #[test]
    fn test_fractional_exp() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = encode_for_test(&json!({"exp": 1_700_000_000.5}));
        assert!(!TokenCodec::is_expired_at(&token, 0, now).unwrap());
    }

    #[test]
    fn test_non_numeric_exp_is_malformed() {
        let token = encode_for_test(&json!({"exp": "tomorrow"}));
        assert!(matches!(
            TokenCodec::is_expired(&token, 0),
            Err(SessionError::MalformedToken(_))
        ));
    }
}
