//! Authentication for Firmament
//!
//! Provides:
//! - JWT token generation and validation
//! - Principal resolution from the Authorization header
//! - Password hashing with Argon2

pub mod jwt;
pub mod password;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput};
pub use password::{hash_password, verify_password};

use crate::types::FirmamentError;

/// The authenticated actor making a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

impl Principal {
    pub fn id(&self) -> &str {
        &self.user_id
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            username: claims.username,
        }
    }
}

/// Resolve the principal behind an Authorization header value.
///
/// A missing credential is `Unauthorized`; a credential that fails
/// verification (bad signature, expired) is `Forbidden`.
pub fn resolve_principal(
    jwt: &JwtValidator,
    auth_header: Option<&str>,
) -> Result<Principal, FirmamentError> {
    let token = extract_token_from_header(auth_header)
        .ok_or_else(|| FirmamentError::Unauthorized("Unauthorized".into()))?;

    jwt.verify_token(token).map(Principal::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_principal_outcomes() {
        let jwt = JwtValidator::new_dev();

        let missing = resolve_principal(&jwt, None).unwrap_err();
        assert!(matches!(missing, FirmamentError::Unauthorized(_)));

        let invalid = resolve_principal(&jwt, Some("Bearer not-a-token")).unwrap_err();
        assert!(matches!(invalid, FirmamentError::Forbidden(_)));

        let token = jwt
            .generate_token(TokenInput {
                user_id: "64f0c2a1e4b0a1b2c3d4e5f6".into(),
                email: "ada@example.com".into(),
                username: "ada".into(),
            })
            .unwrap();
        let header = format!("Bearer {}", token);
        let principal = resolve_principal(&jwt, Some(&header)).unwrap();
        assert_eq!(principal.id(), "64f0c2a1e4b0a1b2c3d4e5f6");
        assert_eq!(principal.username, "ada");
    }
}
