//! Bearer token expiry decoding.
//!
//! Tokens are expected in the three-segment `header.payload.signature` shape
//! with a base64url JSON payload carrying a numeric `exp` claim (epoch
//! seconds). The signature is never verified here; the backend does that.

use crate::error::{AuthError, Result};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;

// base64url with or without trailing `=`.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims the bridge reads from an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenClaims {
    /// Expiry, epoch seconds.
    pub exp: i64,
}

impl TokenClaims {
    /// Decode the payload segment of `token`.
    ///
    /// # Errors
    ///
    /// [`AuthError::MalformedToken`] when the token is not three segments,
    /// the payload is not base64url JSON, or `exp` is missing or not a
    /// number.
    pub fn decode(token: &str) -> Result<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(AuthError::MalformedToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        }

        let payload = PAYLOAD_ENGINE
            .decode(segments[1])
            .map_err(|e| AuthError::MalformedToken(format!("payload is not base64url: {}", e)))?;

        let claims: Value = serde_json::from_slice(&payload)
            .map_err(|e| AuthError::MalformedToken(format!("payload is not JSON: {}", e)))?;

        let exp = match claims.get("exp") {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.floor() as i64))
                .ok_or_else(|| AuthError::MalformedToken("exp out of range".to_string()))?,
            Some(_) => {
                return Err(AuthError::MalformedToken(
                    "exp claim is not a number".to_string(),
                ))
            }
            None => return Err(AuthError::MalformedToken("missing exp claim".to_string())),
        };

        Ok(Self { exp })
    }

    /// Whether the token has expired at `now_secs`, allowing `leeway_secs`
    /// of grace after `exp`.
    pub fn is_expired_at(&self, now_secs: i64, leeway_secs: u64) -> bool {
        let leeway = i64::try_from(leeway_secs).unwrap_or(i64::MAX);
        self.exp.saturating_add(leeway) < now_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn token_with_payload(payload: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn test_decodes_exp() {
        let token = token_with_payload(r#"{"sub":"1","exp":1700000000}"#);
        assert_eq!(TokenClaims::decode(&token).unwrap().exp, 1_700_000_000);
    }

    #[test]
    fn test_tolerates_padding() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":10}"#);
        assert!(padded.ends_with('='));
        let token = format!("h.{}.s", padded);
        assert_eq!(TokenClaims::decode(&token).unwrap().exp, 10);
    }

    #[test]
    fn test_float_exp_is_accepted() {
        let token = token_with_payload(r#"{"exp":1700000000.9}"#);
        assert_eq!(TokenClaims::decode(&token).unwrap().exp, 1_700_000_000);
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        let cases = [
            "opaque-token".to_string(),
            "a.b".to_string(),
            "a.b.c.d".to_string(),
            "abc.def.ghi".to_string(),
            "h.!!!.s".to_string(),
            token_with_payload(r#"{"sub":"1"}"#),
            token_with_payload(r#"{"exp":"tomorrow"}"#),
            token_with_payload("[1,2,3]"),
        ];

        for token in cases {
            assert!(
                matches!(TokenClaims::decode(&token), Err(AuthError::MalformedToken(_))),
                "{}",
                token
            );
        }
    }

    #[test]
    fn test_expiry_comparison() {
        let claims = TokenClaims { exp: 1_000 };

        assert!(!claims.is_expired_at(999, 0));
        assert!(!claims.is_expired_at(1_000, 0));
        assert!(claims.is_expired_at(1_001, 0));
        assert!(!claims.is_expired_at(1_030, 30));
        assert!(claims.is_expired_at(1_031, 30));
    }
}
