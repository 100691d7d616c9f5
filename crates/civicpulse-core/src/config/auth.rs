//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Token validation settings. Tokens are issued by the external auth
/// service; this process only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC-SHA256 secret used by the auth service.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Allowed clock skew in seconds when checking `exp`.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
    /// Reject tokens the auth service has revoked on logout (looked up in
    /// Redis under the raw token).
    #[serde(default = "default_true")]
    pub check_revocation: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            leeway_seconds: default_leeway(),
            check_revocation: true,
        }
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_leeway() -> u64 {
    5
}

fn default_true() -> bool {
    true
}
