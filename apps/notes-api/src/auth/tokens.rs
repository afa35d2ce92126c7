//! Session token verification, issuance and revocation.
//!
//! Sessions are HS256 JWTs carrying a `userId` claim. Revoked tokens are
//! recorded in the key-value store under `blacklist:<token>` until they
//! would have expired anyway.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::kv::KeyValueStore;
use crate::error::{StoreError, TokenError};
use crate::models::id::deserialize_numeric;

/// Default session lifetime (7 days).
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 3600;

const DENYLIST_PREFIX: &str = "blacklist:";

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "userId", deserialize_with = "deserialize_numeric")]
    pub user_id: i64,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

pub fn denylist_key(token: &str) -> String {
    format!("{DENYLIST_PREFIX}{token}")
}

#[derive(Clone)]
pub struct TokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    denylist: Arc<dyn KeyValueStore>,
}

impl TokenVerifier {
    pub fn new(secret: &str, denylist: Arc<dyn KeyValueStore>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            denylist,
        }
    }

    /// Resolve a token to the user id it was issued for.
    ///
    /// The denylist check fails open: if the key-value store cannot be
    /// reached, a correctly signed and unexpired token is accepted.
    pub async fn verify(&self, token: &str) -> Result<i64, TokenError> {
        let claims = self.decode(token)?;

        match self.denylist.get(&denylist_key(token.trim())).await {
            Ok(Some(_)) => return Err(TokenError::Revoked),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(?err, "token denylist unreachable, skipping revocation check");
            }
        }

        Ok(claims.user_id)
    }

    /// Sign a session token for `user_id` valid for `ttl_secs`.
    pub fn issue(&self, user_id: i64, ttl_secs: i64) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = SessionClaims {
            user_id,
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
            iat: now.timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(
            |e| {
                tracing::error!(?e, "failed to sign session token");
                TokenError::Signing
            },
        )
    }

    /// Add `token` to the denylist for the remainder of its lifetime.
    ///
    /// Tokens that no longer verify are already unusable and are skipped.
    pub async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        let Ok(claims) = self.decode(token) else {
            return Ok(());
        };

        let remaining = (claims.exp - Utc::now().timestamp()).max(1) as u64;
        self.denylist
            .set_ex(&denylist_key(token.trim()), "1", remaining)
            .await
    }

    fn decode(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::debug!(?e, "session token rejected");
                    TokenError::Invalid
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::db::kv::MemoryStore;

    struct OfflineStore;

    #[async_trait]
    impl KeyValueStore for OfflineStore {
        async fn set_ex(&self, _: &str, _: &str, _: u64) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("redis down".into()))
        }
        async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("redis down".into()))
        }
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new("test-secret", Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn issued_token_verifies_to_user() {
        let v = verifier();
        let token = v.issue(7, SESSION_TTL_SECS).unwrap();
        assert_eq!(v.verify(&token).await, Ok(7));
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid() {
        let token = TokenVerifier::new("other", Arc::new(MemoryStore::new()))
            .issue(7, 60)
            .unwrap();
        assert_eq!(verifier().verify(&token).await, Err(TokenError::Invalid));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let v = verifier();
        let token = v.issue(7, -3600).unwrap();
        assert_eq!(v.verify(&token).await, Err(TokenError::Expired));
    }

    #[tokio::test]
    async fn empty_and_garbage_tokens() {
        let v = verifier();
        assert_eq!(v.verify("  ").await, Err(TokenError::Missing));
        assert_eq!(v.verify("not.a.jwt").await, Err(TokenError::Invalid));
    }

    #[tokio::test]
    async fn string_user_id_claim_is_accepted() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "userId": "42", "exp": Utc::now().timestamp() + 600 }),
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert_eq!(verifier().verify(&token).await, Ok(42));
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let v = verifier();
        let token = v.issue(7, 600).unwrap();
        v.revoke(&token).await.unwrap();
        assert_eq!(v.verify(&token).await, Err(TokenError::Revoked));
    }

    #[tokio::test]
    async fn denylist_outage_fails_open() {
        let v = TokenVerifier::new("test-secret", Arc::new(OfflineStore));
        let token = v.issue(9, 600).unwrap();
        assert_eq!(v.verify(&token).await, Ok(9));
    }
}
