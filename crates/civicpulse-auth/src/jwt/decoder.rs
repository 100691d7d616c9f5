//! JWT token validation.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use civicpulse_core::config::AuthConfig;
use civicpulse_core::error::AppError;

use super::claims::Claims;
use crate::revocation::{NoRevocation, RevocationList};

/// Validates HS256 access tokens and consults the revocation list.
#[derive(Clone)]
pub struct JwtDecoder {
    decoding_key: DecodingKey,
    validation: Validation,
    revocation: Arc<dyn RevocationList>,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a decoder that does not check revocation.
    pub fn new(config: &AuthConfig) -> Self {
        Self::with_revocation(config, Arc::new(NoRevocation))
    }

    /// Creates a decoder backed by a revocation list.
    pub fn with_revocation(config: &AuthConfig, revocation: Arc<dyn RevocationList>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;
        validation.required_spec_claims = ["exp".to_string()].into_iter().collect();

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            revocation,
        }
    }

    /// Verify signature and expiry, then reject revoked tokens.
    pub async fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.decode_token(token)?;
        if self.revocation.is_revoked(token).await {
            return Err(AppError::authentication("Token has been revoked"));
        }
        Ok(claims)
    }

    fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::authentication("Token has expired")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => {
                        AppError::authentication("Invalid token format")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AppError::authentication("Invalid token signature")
                    }
                    _ => AppError::authentication(format!("Token validation failed: {e}")),
                }
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};

    use civicpulse_core::error::ErrorKind;
    use civicpulse_core::types::id::UserId;
    use civicpulse_entity::user::UserRole;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            ..AuthConfig::default()
        }
    }

    fn token(secret: &str, role: &str, exp: i64) -> String {
        let claims = serde_json::json!({ "user_id": 7, "role": role, "exp": exp });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[derive(Debug)]
    struct RevokeAll;

    #[async_trait]
    impl RevocationList for RevokeAll {
        async fn is_revoked(&self, _token: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_decodes_valid_token() {
        let decoder = JwtDecoder::new(&config());
        let exp = Utc::now().timestamp() + 3600;
        let claims = decoder
            .decode(&token("test-secret", "government", exp))
            .await
            .unwrap();
        assert_eq!(claims.user_id, UserId(7));
        assert_eq!(claims.role, UserRole::Government);
    }

    #[tokio::test]
    async fn test_rejects_wrong_secret_and_expired() {
        let decoder = JwtDecoder::new(&config());
        let exp = Utc::now().timestamp() + 3600;
        let err = decoder
            .decode(&token("other", "citizen", exp))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);

        let expired = Utc::now().timestamp() - 3600;
        assert!(
            decoder
                .decode(&token("test-secret", "citizen", expired))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_rejects_unknown_role() {
        let decoder = JwtDecoder::new(&config());
        let exp = Utc::now().timestamp() + 3600;
        assert!(
            decoder
                .decode(&token("test-secret", "superuser", exp))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_rejects_revoked_token() {
        let decoder = JwtDecoder::with_revocation(&config(), Arc::new(RevokeAll));
        let exp = Utc::now().timestamp() + 3600;
        let err = decoder
            .decode(&token("test-secret", "citizen", exp))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Token has been revoked");
    }
}
