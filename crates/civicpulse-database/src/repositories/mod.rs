//! PostgreSQL-backed gateway implementations.

pub mod directory;
pub mod notification;

pub use directory::DirectoryRepository;
pub use notification::NotificationRepository;
