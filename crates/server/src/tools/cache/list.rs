//! cache_list tool implementation.
//!
//! Lists stored partitions with their entry counts.

use lander_core::cache::PartitionStats;
use lander_core::{CacheDb, Error, PartitionNames};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartitionSummary {
    #[serde(flatten)]
    pub stats: PartitionStats,
    /// Whether the partition belongs to the running version.
    pub current: bool,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    pub partitions: Vec<PartitionSummary>,
}

pub async fn list_impl(
    cache: &CacheDb, current: &PartitionNames, _params: CacheListParams,
) -> Result<CallToolResult, McpError> {
    let partitions = cache
        .partition_stats()
        .await?
        .into_iter()
        .map(|stats| PartitionSummary { current: current.contains(&stats.name), stats })
        .collect();

    let json = serde_json::to_string_pretty(&CacheListOutput { partitions })
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
