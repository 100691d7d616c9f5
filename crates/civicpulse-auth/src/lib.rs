//! # civicpulse-auth
//!
//! Access token validation for the notification hub. Tokens are issued by
//! the platform auth service; this crate only verifies them.
//!
//! ## Modules
//!
//! - `jwt` — claims layout and HS256 verification
//! - `revocation` — logout revocation list lookups

pub mod jwt;
pub mod revocation;

pub use jwt::{Claims, JwtDecoder};
pub use revocation::{NoRevocation, RedisRevocationList, RevocationList};
