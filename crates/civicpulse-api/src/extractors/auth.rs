//! `AuthUser` extractor: pulls the JWT from the Authorization header and
//! validates it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use civicpulse_auth::Claims;
use civicpulse_core::error::AppError;
use civicpulse_core::types::id::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller available in handlers.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// The caller's user id.
    pub fn user_id(&self) -> UserId {
        self.0.user_id
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::authentication("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::authentication("Invalid Authorization header format"))?;

        let claims = state.jwt_decoder.decode(token).await?;
        Ok(AuthUser(claims))
    }
}
