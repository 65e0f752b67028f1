//! SQLite-backed cache partitions for intercepted responses.
//!
//! This module provides named, durable key/response stores using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Lazily created, version-tagged partitions
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - FIFO eviction by insertion sequence
//! - Per-entry write timestamps for freshness checks

pub mod connection;
pub mod entries;
pub mod migrations;
pub mod partitions;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CacheEntry, ResponseRecord};
pub use partitions::{PartitionNames, PartitionStats};
