//! cache_purge tool implementation.
//!
//! Deletes a partition outright or trims partitions to their newest entries.

use lander_core::{CacheDb, Error, PartitionNames};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Partition to act on. Alone, the whole partition is deleted.
    pub partition: Option<String>,

    /// Keep only the newest N entries. Without a partition, applies to
    /// every current partition.
    pub max_entries: Option<usize>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Partitions deleted.
    pub deleted_partitions: Vec<String>,
    /// Entries evicted by trimming.
    pub deleted_entries: u64,
}

pub async fn purge_impl(
    cache: &CacheDb, current: &PartitionNames, params: CachePurgeParams,
) -> Result<CallToolResult, McpError> {
    let mut output = CachePurgeOutput { deleted_partitions: Vec::new(), deleted_entries: 0 };

    match (params.partition, params.max_entries) {
        (None, None) => {
            return Err(Error::InvalidInput("At least one of partition or max_entries must be specified".into()).into());
        }
        (Some(partition), None) => {
            if cache.delete_partition(&partition).await? {
                tracing::info!(partition = %partition, "purged cache partition");
                output.deleted_partitions.push(partition);
            }
        }
        (Some(partition), Some(max)) => {
            output.deleted_entries = cache.trim_partition(&partition, max).await?;
        }
        (None, Some(max)) => {
            for partition in current.all() {
                output.deleted_entries += cache.trim_partition(partition, max).await?;
            }
        }
    }

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
