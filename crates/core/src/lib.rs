//! Core types and shared functionality for lander.
//!
//! This crate provides:
//! - Durable cache partitions with a SQLite backend
//! - Unified error types
//! - Layered configuration

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheEntry, PartitionNames, ResponseRecord};
pub use config::{AppConfig, ConfigError, Mode};
pub use error::Error;
