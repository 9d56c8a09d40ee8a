//! Client-side access-token inspection.
//!
//! The payload is decoded without verifying the signature. The decoded role is a
//! UI hint only; anything crossing a trust boundary relies on the server
//! verifying the bearer token.

use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::ClientError;
use crate::models::{Identity, Session};

/// base64url as used by JWT segments, accepting padded and unpadded input
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims read from the access-token payload
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<JsonValue>,
    #[serde(default)]
    pub app_metadata: Option<JsonValue>,
    #[serde(default)]
    pub role: Option<JsonValue>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
}

impl TokenClaims {
    /// First non-empty role among `user_metadata.role`, `app_metadata.role`, `role`.
    pub fn role(&self) -> Option<String> {
        let nested = |metadata: &Option<JsonValue>| {
            metadata
                .as_ref()
                .and_then(|value| value.get("role"))
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        };

        nested(&self.user_metadata)
            .filter(|role| !role.is_empty())
            .or_else(|| nested(&self.app_metadata).filter(|role| !role.is_empty()))
            .or_else(|| {
                self.role
                    .as_ref()
                    .and_then(JsonValue::as_str)
                    .filter(|role| !role.is_empty())
                    .map(str::to_string)
            })
    }
}

/// Decode the payload segment of an access token.
pub fn decode_claims(access_token: &str) -> Result<TokenClaims, ClientError> {
    let mut segments = access_token.split('.');
    let payload = match (segments.next(), segments.next()) {
        (Some(_), Some(payload)) => payload,
        _ => {
            return Err(ClientError::Decode(
                "access token has fewer than two segments".to_string(),
            ));
        }
    };

    let bytes = SEGMENT_ENGINE
        .decode(payload)
        .map_err(|err| ClientError::Decode(format!("token payload is not base64url: {err}")))?;

    Ok(serde_json::from_slice(&bytes)?)
}

/// Role claim embedded in the access token, or `None` on any decode failure.
pub fn parse_role_from_token(access_token: &str) -> Option<String> {
    match decode_claims(access_token) {
        Ok(claims) => claims.role(),
        Err(err) => {
            tracing::debug!(error = %err, "Ignoring undecodable access token");
            None
        }
    }
}

/// Session for a bare access token, e.g. one handed over on the command line.
pub fn session_from_token(access_token: &str) -> Result<Session, ClientError> {
    let claims = decode_claims(access_token)?;
    let id = claims
        .sub
        .as_deref()
        .and_then(|sub| Uuid::parse_str(sub).ok())
        .ok_or_else(|| ClientError::Decode("access token has no subject".to_string()))?;

    Ok(Session {
        user: Identity {
            id,
            email: claims.email,
        },
        access_token: access_token.to_string(),
        refresh_token: None,
        expires_at: claims.exp.and_then(|exp| DateTime::from_timestamp(exp, 0)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_with_payload(payload: &JsonValue) -> String {
        let header = SEGMENT_ENGINE.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = SEGMENT_ENGINE.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn user_metadata_role_wins() {
        let token = token_with_payload(&json!({
            "sub": "user-1",
            "role": "authenticated",
            "app_metadata": { "role": "admin" },
            "user_metadata": { "role": "agent" }
        }));
        assert_eq!(parse_role_from_token(&token).as_deref(), Some("agent"));
    }

    #[test]
    fn falls_back_to_app_metadata_then_top_level() {
        let token = token_with_payload(&json!({
            "role": "authenticated",
            "app_metadata": { "role": "company" },
            "user_metadata": {}
        }));
        assert_eq!(parse_role_from_token(&token).as_deref(), Some("company"));

        let token = token_with_payload(&json!({ "role": "admin", "user_metadata": { "role": "" } }));
        assert_eq!(parse_role_from_token(&token).as_deref(), Some("admin"));
    }

    #[test]
    fn no_role_anywhere_is_none() {
        let token = token_with_payload(&json!({ "sub": "user-1" }));
        assert_eq!(parse_role_from_token(&token), None);
    }

    #[test]
    fn malformed_tokens_never_panic() {
        assert_eq!(parse_role_from_token(""), None);
        assert_eq!(parse_role_from_token("single-segment"), None);
        assert_eq!(parse_role_from_token("a.%%%.c"), None);

        let not_json = format!("h.{}.s", SEGMENT_ENGINE.encode("not json"));
        assert_eq!(parse_role_from_token(&not_json), None);
    }

    #[test]
    fn padded_payload_is_accepted() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"role":"agent"}"#);
        assert_eq!(
            parse_role_from_token(&format!("h.{payload}.s")).as_deref(),
            Some("agent")
        );
    }

    #[test]
    fn session_from_token_reads_subject_and_expiry() {
        let user_id = Uuid::new_v4();
        let token = token_with_payload(&json!({
            "sub": user_id.to_string(),
            "email": "agent@example.com",
            "exp": 1_900_000_000
        }));

        let session = session_from_token(&token).unwrap();
        assert_eq!(session.user.id, user_id);
        assert_eq!(session.user.email.as_deref(), Some("agent@example.com"));
        assert_eq!(session.expires_at.unwrap().timestamp(), 1_900_000_000);

        let anonymous = token_with_payload(&json!({ "role": "anon" }));
        assert!(matches!(
            session_from_token(&anonymous),
            Err(ClientError::Decode(_))
        ));
    }
}
