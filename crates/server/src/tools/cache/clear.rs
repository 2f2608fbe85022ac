//! cache_clear tool implementation.
//!
//! Removes expired entries, or every entry when `expired_only` is false.

use querycache_core::QueryCache;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearParams {
    /// Only remove expired entries. Defaults to true.
    #[serde(default = "default_true")]
    pub expired_only: bool,
}

impl Default for CacheClearParams {
    fn default() -> Self {
        Self { expired_only: true }
    }
}

fn default_true() -> bool {
    true
}

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheClearOutput {
    pub expired_only: bool,
    /// Persistent rows deleted; only reported for expired-only clears.
    pub deleted: Option<u64>,
    /// False if the persistent tier could not be cleared.
    pub success: bool,
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(cache: &QueryCache, params: CacheClearParams) -> Result<CallToolResult, McpError> {
    let output = if params.expired_only {
        let deleted = cache.clear_expired().await;
        CacheClearOutput { expired_only: true, deleted: Some(deleted), success: true }
    } else {
        let success = cache.clear_all().await;
        CacheClearOutput { expired_only: false, deleted: None, success }
    };

    tracing::info!(expired_only = output.expired_only, deleted = ?output.deleted, success = output.success, "cache cleared");
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{decode, make_cache};
    use serde_json::json;

    #[tokio::test]
    async fn test_clear_expired_default() {
        let cache = make_cache().await;
        cache.store("passport", "CA", "Fresno", json!([1])).await.unwrap();

        let params: CacheClearParams = serde_json::from_value(json!({})).unwrap();
        assert!(params.expired_only);

        let result = clear_impl(&cache, params).await.unwrap();
        let output: CacheClearOutput = decode(&result);
        assert_eq!(output.deleted, Some(0));
        assert!(cache.lookup("passport", "CA", "Fresno").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let cache = make_cache().await;
        cache.store("passport", "CA", "Fresno", json!([1])).await.unwrap();

        let result = clear_impl(&cache, CacheClearParams { expired_only: false }).await.unwrap();
        let output: CacheClearOutput = decode(&result);
        assert!(output.success);
        assert!(cache.lookup("passport", "CA", "Fresno").await.unwrap().is_none());
        assert_eq!(cache.db().unwrap().count_entries().await.unwrap(), 0);
    }
}
