//! cache_lookup tool implementation.
//!
//! Looks up a cached result for a query at a location.

use querycache_core::QueryCache;
use querycache_core::cache::hash::fingerprint;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::json_result;

/// Parameters for the cache_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheLookupParams {
    /// Free-text service query, e.g. "passport application".
    pub query: String,
    /// State or region, e.g. "CA".
    pub state: String,
    /// City, e.g. "Fresno".
    pub city: String,
}

/// Output from the cache_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheLookupOutput {
    pub hit: bool,
    pub fingerprint: String,
    /// `memory`, `persistent`, or `synonym` on a hit.
    pub source: Option<String>,
    /// Query the stored entry was saved under; differs from the request after a synonym rewrite.
    pub matched_query: Option<String>,
    pub hit_count: Option<i64>,
    pub result: Option<Value>,
}

/// Implementation of the cache_lookup tool.
pub async fn lookup_impl(cache: &QueryCache, params: CacheLookupParams) -> Result<CallToolResult, McpError> {
    let hit = cache
        .lookup(&params.query, &params.state, &params.city)
        .await?;

    let output = match hit {
        Some(hit) => CacheLookupOutput {
            hit: true,
            fingerprint: hit.fingerprint,
            source: Some(hit.source.to_string()),
            matched_query: Some(hit.entry.normalized_query),
            hit_count: Some(hit.entry.hit_count),
            result: Some(hit.entry.result),
        },
        None => CacheLookupOutput {
            hit: false,
            fingerprint: fingerprint(&params.query, &params.state, &params.city),
            source: None,
            matched_query: None,
            hit_count: None,
            result: None,
        },
    };

    json_result(&output)
}
