//! Logout revocation list.
//!
//! The auth service stores revoked tokens in Redis as `<token> = "blacklisted"`
//! with a TTL matching the token lifetime.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::warn;

const REVOKED_MARKER: &str = "blacklisted";

/// Lookup of revoked tokens.
#[async_trait]
pub trait RevocationList: Send + Sync + std::fmt::Debug + 'static {
    /// Whether the raw token has been revoked.
    async fn is_revoked(&self, token: &str) -> bool;
}

/// Revocation list that never revokes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRevocation;

#[async_trait]
impl RevocationList for NoRevocation {
    async fn is_revoked(&self, _token: &str) -> bool {
        false
    }
}

/// Redis-backed revocation list shared with the auth service.
///
/// Fails open: when Redis cannot be reached the token is treated as valid
/// and a warning is logged.
#[derive(Clone)]
pub struct RedisRevocationList {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisRevocationList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRevocationList").finish()
    }
}

impl RedisRevocationList {
    /// Wrap an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RevocationList for RedisRevocationList {
    async fn is_revoked(&self, token: &str) -> bool {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(token).await {
            Ok(value) => value.as_deref() == Some(REVOKED_MARKER),
            Err(e) => {
                warn!(error = %e, "Revocation lookup failed, accepting token");
                false
            }
        }
    }
}
