/**
 * Session Tokens
 *
 * HS256 JWTs presented on the live-transport handshake. Verification checks
 * the signature and expiry and yields the bound identity; anything else makes
 * the connection anonymous.
 */

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::UserId;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID; tokens issued by the web API carry it as `id`
    #[serde(alias = "id")]
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
}

impl Claims {
    pub fn user_id(&self) -> UserId {
        UserId::new(self.sub.clone())
    }
}

/// Create a signed token for `user` valid for `ttl`
pub fn create_token(secret: &[u8], user: &UserId, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp().max(0) as u64;
    let claims = Claims {
        sub: user.as_str().to_string(),
        exp: now + ttl.as_secs(),
        iat: now,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

/// Verify and decode a token
pub fn verify_token(secret: &[u8], token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &Validation::default())?;
    Ok(token_data.claims)
}

/// Resolve the identity for a handshake. Missing or invalid credentials
/// yield an anonymous connection.
pub fn identity_from_token(secret: &[u8], token: Option<&str>) -> Option<UserId> {
    let token = token.filter(|t| !t.is_empty())?;
    match verify_token(secret, token) {
        Ok(claims) if !claims.sub.is_empty() => Some(claims.user_id()),
        Ok(_) => {
            tracing::warn!("[Auth] Token without subject, connecting anonymously");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "[Auth] Invalid handshake token, connecting anonymously");
            None
        }
    }
}
