//! # civicpulse-api
//!
//! HTTP API layer for CivicPulse built on Axum.
//!
//! Provides the push WebSocket upgrade, the notification backlog endpoints,
//! health and readiness probes, extractors, DTOs, and error mapping.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
