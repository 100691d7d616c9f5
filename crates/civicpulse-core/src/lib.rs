//! # civicpulse-core
//!
//! Core crate for the CivicPulse notification hub. Contains configuration
//! schemas, typed identifiers, pagination types, and the unified error
//! system.
//!
//! This crate has **no** internal dependencies on other CivicPulse crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
