//! Access-token verification.
//!
//! Tokens are HS256 JWTs minted by the identity provider that owns the
//! `users` table. This service never issues them; it checks the signature
//! and expiry and reads the caller id from `sub`.

use std::fmt;

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use vidcat_core::types::DbId;

/// Claims read from an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// The caller's user id.
    pub sub: DbId,
    pub exp: i64,
    pub iat: i64,
}

/// Shared secret for HS256 verification.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl JwtConfig {
    /// Read `JWT_SECRET`.
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is unset or empty.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        assert!(
            !secret.is_empty(),
            "JWT_SECRET must be set to a non-empty value"
        );
        Self { secret }
    }
}

/// Verify `token` and return its claims. `exp` is required.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(config.secret.as_bytes());
    decode::<Claims>(token, &key, &Validation::default()).map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

    fn config(secret: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
        }
    }

    fn mint(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[test]
    fn valid_token_yields_subject() {
        let user_id = Uuid::new_v4();
        let token = mint(json!({ "sub": user_id, "iat": now(), "exp": now() + 600 }), SECRET);

        let claims = validate_token(&token, &config(SECRET)).unwrap();
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn expired_token_is_rejected() {
        // Beyond the default 60-second leeway.
        let token = mint(
            json!({ "sub": Uuid::new_v4(), "iat": now() - 600, "exp": now() - 300 }),
            SECRET,
        );
        assert!(validate_token(&token, &config(SECRET)).is_err());
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = mint(
            json!({ "sub": Uuid::new_v4(), "iat": now(), "exp": now() + 600 }),
            "secret-alpha",
        );
        assert!(validate_token(&token, &config("secret-bravo")).is_err());
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let token = mint(json!({ "sub": "alice", "iat": now(), "exp": now() + 600 }), SECRET);
        assert!(validate_token(&token, &config(SECRET)).is_err());
    }

    #[test]
    fn debug_output_hides_secret() {
        let rendered = format!("{:?}", config(SECRET));
        assert!(!rendered.contains(SECRET));
    }
}
