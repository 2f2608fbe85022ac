//! cache_store tool implementation.
//!
//! Stores a freshly computed result so later lookups can skip the upstream call.

use std::time::Duration;

use querycache_core::QueryCache;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::json_result;

/// Parameters for the cache_store tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStoreParams {
    pub query: String,
    pub state: String,
    pub city: String,

    /// Result payload to cache. Any JSON value.
    pub result: Value,

    /// Lifetime in seconds. Defaults to the server's configured TTL.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

/// Output from the cache_store tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStoreOutput {
    pub fingerprint: String,
    /// False when only the memory tier accepted the entry.
    pub persisted: bool,
    pub ttl_secs: u64,
}

/// Implementation of the cache_store tool.
pub async fn store_impl(cache: &QueryCache, params: CacheStoreParams) -> Result<CallToolResult, McpError> {
    let ttl = params
        .ttl_secs
        .map_or_else(|| cache.config().ttl(), Duration::from_secs);

    let receipt = cache
        .store_with_ttl(&params.query, &params.state, &params.city, params.result, ttl)
        .await?;

    json_result(&CacheStoreOutput { fingerprint: receipt.fingerprint, persisted: receipt.persisted, ttl_secs: ttl.as_secs() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{decode, make_cache};
    use serde_json::json;

    fn params(ttl_secs: Option<u64>) -> CacheStoreParams {
        CacheStoreParams {
            query: "birth certificate".to_string(),
            state: "TX".to_string(),
            city: "Austin".to_string(),
            result: json!({ "results": [{ "name": "Vital Records" }] }),
            ttl_secs,
        }
    }

    #[tokio::test]
    async fn test_store_default_ttl() {
        let cache = make_cache().await;
        let result = store_impl(&cache, params(None)).await.unwrap();
        let output: CacheStoreOutput = decode(&result);
        assert!(output.persisted);
        assert_eq!(output.ttl_secs, 86_400);

        let hit = cache.lookup("birth certificate", "TX", "Austin").await.unwrap().unwrap();
        assert_eq!(hit.fingerprint, output.fingerprint);
    }

    #[tokio::test]
    async fn test_store_custom_ttl() {
        let cache = make_cache().await;
        let result = store_impl(&cache, params(Some(60))).await.unwrap();
        let output: CacheStoreOutput = decode(&result);
        assert_eq!(output.ttl_secs, 60);

        let entry = cache
            .db()
            .unwrap()
            .get_entry(&output.fingerprint)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((entry.expires_at - entry.created_at).num_seconds(), 60);
    }

    #[tokio::test]
    async fn test_store_zero_ttl() {
        let cache = make_cache().await;
        let err = store_impl(&cache, params(Some(0))).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
        assert!(err.message.contains("ttl"));
        assert!(cache.memory().is_empty());
    }

    #[tokio::test]
    async fn test_store_missing_city() {
        let cache = make_cache().await;
        let mut p = params(None);
        p.city = String::new();
        let err = store_impl(&cache, p).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
