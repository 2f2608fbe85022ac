//! MCP tool implementations.
//!
//! This module contains all tools exposed by the mcp-querycache server.

pub mod cache;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

/// Wrap a tool output as pretty-printed JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| ToolError::SerializeFailed(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod test_support {
    use querycache_core::{AppConfig, CacheDb, QueryCache};
    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;

    pub async fn make_cache() -> QueryCache {
        let db = CacheDb::open_in_memory().await.unwrap();
        QueryCache::with_db(Some(db), AppConfig::default())
    }

    pub fn decode<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
