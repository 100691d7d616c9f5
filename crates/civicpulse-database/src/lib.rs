//! # civicpulse-database
//!
//! PostgreSQL connection management, the notification persistence gateway,
//! and the organizational staff directory. In-memory implementations of
//! both gateways are provided for tests and local runs.

pub mod connection;
pub mod gateway;
pub mod memory;
pub mod repositories;

pub use connection::DatabasePool;
pub use gateway::{NotificationStore, StaffDirectory};
pub use memory::{MemoryNotificationStore, MemoryStaffDirectory};
pub use repositories::{DirectoryRepository, NotificationRepository};
