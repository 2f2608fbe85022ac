//! cache_stats tool implementation.

use querycache_core::QueryCache;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

const DEFAULT_DAYS: u32 = 7;
const MAX_DAYS: u32 = 365;

/// Parameters for the cache_stats tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsParams {
    /// Trailing window in days, today included. Defaults to 7, capped at 365.
    #[serde(default)]
    pub days: Option<u32>,
}

/// Implementation of the cache_stats tool.
pub async fn stats_impl(cache: &QueryCache, params: CacheStatsParams) -> Result<CallToolResult, McpError> {
    let days = params.days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS);
    let report = cache.stats(days).await;
    json_result(&report)
}
