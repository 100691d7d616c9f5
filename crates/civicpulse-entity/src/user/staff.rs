//! Staff directory entry.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use civicpulse_core::types::id::UserId;

/// A staff member returned by the organizational directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StaffRef {
    /// The staff member's user id.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
}
