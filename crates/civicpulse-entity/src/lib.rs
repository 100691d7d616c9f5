//! # civicpulse-entity
//!
//! Domain entity models for the CivicPulse notification hub. Database
//! entities derive `sqlx::FromRow`; upstream event payloads mirror the JSON
//! published by the reporting services.

pub mod event;
pub mod notification;
pub mod user;
