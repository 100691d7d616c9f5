//! Upstream event consumption for CivicPulse.
//!
//! This crate provides:
//! - An event source abstraction with consumer-group semantics
//! - A Redis Streams source and an in-memory source
//! - A per-topic consumer with backoff and acknowledge-after-processing
//! - A fleet that runs one consumer per topic and reports their health

pub mod consumer;
pub mod health;
pub mod memory;
pub mod redis_stream;
pub mod runner;
pub mod source;

pub use consumer::{Backoff, StreamConsumer};
pub use health::{ConsumerHealth, ConsumerStatus};
pub use memory::MemoryEventSource;
pub use redis_stream::RedisStreamSource;
pub use runner::ConsumerFleet;
pub use source::{EventSource, StreamMessage, stream_key};
