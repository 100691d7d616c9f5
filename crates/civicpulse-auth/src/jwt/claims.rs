//! JWT claims structure issued by the auth service.

use serde::{Deserialize, Serialize};

use civicpulse_core::types::id::UserId;
use civicpulse_entity::user::UserRole;

/// Claims payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated user.
    pub user_id: UserId,
    /// Role name at issuance time.
    pub role: UserRole,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}
