//! popular_queries tool implementation.

use querycache_core::QueryCache;
use querycache_core::cache::PopularQueryRecord;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the popular_queries tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PopularQueriesParams {
    /// Maximum number of queries to return. Defaults to 10, capped at 100.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Output from the popular_queries tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularQueriesOutput {
    pub queries: Vec<PopularQueryRecord>,
}

/// Implementation of the popular_queries tool.
pub async fn popular_impl(cache: &QueryCache, params: PopularQueriesParams) -> Result<CallToolResult, McpError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let queries = cache.popular_queries(limit).await;
    json_result(&PopularQueriesOutput { queries })
}
