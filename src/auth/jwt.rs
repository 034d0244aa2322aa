//! Session tokens (HS256)
//!
//! A token names the account it was issued to; verification failures all
//! surface as `Forbidden` so the caller can tell them from a missing header.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::types::FirmamentError;

const MIN_SECRET_LEN: usize = 32;
const DEV_SECRET: &str = "firmament-dev-session-secret-do-not-deploy";
const DEV_EXPIRY_SECONDS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User document id (hex)
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub iat: u64,
    pub exp: u64,
}

/// Account fields copied into a new session
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

#[derive(Clone)]
pub struct JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_seconds: u64,
}

impl JwtValidator {
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, FirmamentError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(FirmamentError::Config(format!(
                "JWT_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self::from_secret(secret.as_bytes(), expiry_seconds))
    }

    pub fn new_dev() -> Self {
        Self::from_secret(DEV_SECRET.as_bytes(), DEV_EXPIRY_SECONDS)
    }

    fn from_secret(secret: &[u8], expiry_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            expiry_seconds,
        }
    }

    pub fn generate_token(&self, input: TokenInput) -> Result<String, FirmamentError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            user_id: input.user_id,
            email: input.email,
            username: input.username,
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| FirmamentError::Auth(format!("Failed to sign session: {}", e)))
    }

    /// Decode a token, checking signature and expiry
    pub fn verify_token(&self, token: &str) -> Result<Claims, FirmamentError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "Session expired",
                    ErrorKind::InvalidSignature => "Invalid session signature",
                    _ => "Invalid session token",
                };
                FirmamentError::Forbidden(reason.into())
            })
    }
}

/// Token from an Authorization value, either `Bearer <token>` or bare
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;
    let token = match header.strip_prefix("Bearer ") {
        Some(rest) => rest.trim(),
        None if !header.trim().contains(' ') => header.trim(),
        None => return None,
    };
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(secret: &str) -> JwtValidator {
        JwtValidator::new(secret.into(), 3600).unwrap()
    }

    fn input() -> TokenInput {
        TokenInput {
            user_id: "64f0c2a1e4b0a1b2c3d4e5f6".into(),
            email: "grace@example.com".into(),
            username: "grace".into(),
        }
    }

    #[test]
    fn test_session_round_trip() {
        let jwt = validator("firmament-test-secret-with-enough-length");
        let token = jwt.generate_token(input()).unwrap();

        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.user_id, "64f0c2a1e4b0a1b2c3d4e5f6");
        assert_eq!(claims.username, "grace");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_foreign_and_expired_tokens_are_forbidden() {
        let token = validator("firmament-test-secret-with-enough-length")
            .generate_token(input())
            .unwrap();
        let other = validator("another-secret-that-is-long-enough-too");
        assert!(matches!(other.verify_token(&token), Err(FirmamentError::Forbidden(_))));

        let expired = JwtValidator {
            expiry_seconds: 0,
            ..JwtValidator::new_dev()
        };
        let claims = Claims {
            user_id: "u1".into(),
            email: "u1@example.com".into(),
            username: "u1".into(),
            iat: 1_000,
            exp: 1_000,
        };
        let stale = encode(&Header::default(), &claims, &expired.encoding).unwrap();
        let err = expired.verify_token(&stale).unwrap_err();
        assert_eq!(err.public_message(), "Session expired");
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(extract_token_from_header(Some("abc123")), Some("abc123"));
        assert_eq!(extract_token_from_header(None), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(JwtValidator::new("short".into(), 3600).is_err());
        assert!(JwtValidator::new(String::new(), 3600).is_err());
    }
}
