//! Install and activate.

use std::collections::BTreeSet;

use lander_core::Error;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use super::{CacheManager, WorkerState};
use crate::fetch::{ResourceRequest, cache_key};

/// Outcome of pre-warming the static partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    /// Cache keys stored.
    pub cached: Vec<String>,
    /// Pre-warm paths that could not be stored, with the reason.
    pub failed: Vec<(String, String)>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl CacheManager {
    /// Pre-warm the static partition with the configured paths.
    ///
    /// A path that cannot be fetched or stored is logged and reported but
    /// never aborts the install. The manager then leaves the install phase
    /// immediately, so `activate` is never blocked.
    pub async fn install(&self) -> InstallReport {
        self.set_state(WorkerState::Installing).await;

        let mut report = InstallReport::default();
        let partition = &self.config.partitions.static_assets;

        for path in &self.config.precache {
            match self.prewarm(partition, path).await {
                Ok(key) => report.cached.push(key),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to pre-warm asset");
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            partition = %partition,
            "install finished"
        );

        // skip waiting: no grace period for sessions still on the old version
        self.set_state(WorkerState::Installed).await;
        report
    }

    async fn prewarm(&self, partition: &str, path: &str) -> Result<String, Error> {
        let url = self
            .config
            .origin
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
        let request = ResourceRequest::get(url).with_header(ACCEPT, "*/*");

        let response = self.network.fetch(&request).await?;
        if !response.is_ok() {
            return Err(Error::Network(format!("status {}", response.status.as_u16())));
        }

        let key = cache_key(&request.url);
        self.db.put_entry(partition, &key, &response.to_record(), None).await?;
        Ok(key)
    }

    /// Drop partitions left behind by other versions and take control.
    ///
    /// Returns the names of the deleted partitions. Partitions with a
    /// current name keep their contents.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.set_state(WorkerState::Activating).await;

        let current = self.config.partitions.to_set();
        let existing: BTreeSet<String> = self.db.partition_names().await?.into_iter().collect();

        let mut deleted = Vec::new();
        for stale in existing.difference(&current) {
            if self.db.delete_partition(stale).await? {
                tracing::info!(partition = %stale, "deleted stale cache partition");
                deleted.push(stale.clone());
            }
        }

        // claim: the next request from an open page goes through the strategies
        self.set_state(WorkerState::Activated).await;
        Ok(deleted)
    }
}
