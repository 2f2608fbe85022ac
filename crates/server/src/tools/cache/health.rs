//! cache_health tool implementation.

use querycache_core::QueryCache;
use rmcp::{ErrorData as McpError, model::CallToolResult};

use crate::tools::json_result;

/// Implementation of the cache_health tool.
pub async fn health_impl(cache: &QueryCache) -> Result<CallToolResult, McpError> {
    let report = cache.health().await;
    json_result(&report)
}
