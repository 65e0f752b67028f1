//! Client side of lander.
//!
//! This crate provides the network seam and the cache manager that decides,
//! per request, between cached copies, live responses and fallbacks.

pub mod fetch;
pub mod manager;

pub use fetch::{FetchClient, FetchConfig, Network, ResourceRequest, ResourceResponse, ResponseSource};
pub use manager::{CacheManager, InstallReport, ManagerConfig, ResourceClass, WorkerState, classify};
