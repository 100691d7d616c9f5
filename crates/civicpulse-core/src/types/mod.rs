//! Core type definitions used across the CivicPulse workspace.

pub mod id;
pub mod pagination;

pub use id::*;
pub use pagination::PageRequest;
