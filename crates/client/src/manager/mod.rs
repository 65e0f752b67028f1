//! Offline resource cache manager.
//!
//! Sits on the request path between the page and the network and decides,
//! per request, how cached copies and live responses are combined.
//!
//! ### Lifecycle
//! - `install` pre-warms the static partition, then moves on without
//!   waiting for older sessions to close.
//! - `activate` drops every partition not named for the current version and
//!   claims control; from then on `handle` applies the strategies.
//!
//! ### Strategies
//! - Images: stale-while-revalidate into a capped partition.
//! - Documents: network-first, cached copy or offline page on failure.
//! - Static assets: cache-first, inert fallback on failure.
//! - Other dynamic content: network-first, cached copy only within the
//!   freshness window, otherwise the network error is returned.

pub mod classify;
pub mod fallback;
mod lifecycle;
mod strategy;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use lander_core::{AppConfig, CacheDb, Error, PartitionNames};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::{Network, ResourceRequest, ResourceResponse, cache_key, is_same_origin};

pub use classify::{AssetKind, ResourceClass, classify};
pub use lifecycle::InstallReport;

/// Manager lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
        }
    }
}

/// Settings the manager needs, resolved from `AppConfig`.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Origin of the page; only requests for it are cached.
    pub origin: Url,
    pub partitions: PartitionNames,
    /// Paths pre-warmed into the static partition.
    pub precache: Vec<String>,
    pub image_max_entries: usize,
    pub dynamic_max_age: Duration,
}

impl ManagerConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        Ok(Self {
            origin,
            partitions: config.partition_names(),
            precache: config.precache.clone(),
            image_max_entries: config.image_max_entries,
            dynamic_max_age: config.dynamic_max_age(),
        })
    }
}

/// The resource cache manager.
pub struct CacheManager {
    db: CacheDb,
    network: Arc<dyn Network>,
    config: ManagerConfig,
    state: RwLock<WorkerState>,
}

impl CacheManager {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, config: ManagerConfig) -> Self {
        Self { db, network, config, state: RwLock::new(WorkerState::Parsed) }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
        tracing::debug!(state = state.as_str(), "cache manager state changed");
    }

    /// Whether requests are currently routed through the strategies.
    pub async fn is_controlling(&self) -> bool {
        self.state().await == WorkerState::Activated
    }

    /// Whether a request is eligible for caching at all.
    pub fn intercepts(&self, request: &ResourceRequest) -> bool {
        request.method == Method::GET && is_same_origin(&request.url, &self.config.origin)
    }

    /// Answer one request from the page.
    ///
    /// Only two paths return `Err`: requests that are not intercepted, which
    /// get the network result untouched, and dynamic content whose network
    /// fetch failed with no fresh cached copy.
    pub async fn handle(&self, request: ResourceRequest) -> Result<ResourceResponse, Error> {
        if !self.is_controlling().await {
            tracing::debug!("not controlling yet, passing {} {} through", request.method, request.url);
            return self.network.fetch(&request).await;
        }

        if !self.intercepts(&request) {
            tracing::debug!("passing {} {} through", request.method, request.url);
            return self.network.fetch(&request).await;
        }

        let class = classify(&request);
        let key = cache_key(&request.url);
        tracing::debug!(class = class.as_str(), "handling {}", key);

        match class {
            ResourceClass::Image => Ok(self.stale_while_revalidate(&request, &key).await),
            ResourceClass::Document => Ok(self.network_first_document(&request, &key).await),
            ResourceClass::StaticAsset(kind) => Ok(self.cache_first(&request, &key, kind).await),
            ResourceClass::Dynamic => self.network_first_dynamic(&request, &key).await,
        }
    }
}
