//! User domain entities.

pub mod role;
pub mod staff;

pub use role::UserRole;
pub use staff::StaffRef;
