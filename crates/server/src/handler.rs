//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{
    CacheClearParams, CacheLookupParams, CacheStatsParams, CacheStoreParams, PopularQueriesParams, clear_impl,
    health_impl, lookup_impl, popular_impl, stats_impl, store_impl,
};

use querycache_core::QueryCache;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for mcp-querycache.
#[derive(Clone)]
pub struct QueryCacheServer {
    cache: Arc<QueryCache>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl QueryCacheServer {
    /// Create a new server handler around a shared cache.
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self { cache, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Look up a cached service-search result by query, state, and city. Tries memory, then disk, then one synonym rewrite."
    )]
    async fn cache_lookup(&self, params: Parameters<CacheLookupParams>) -> Result<CallToolResult, McpError> {
        lookup_impl(&self.cache, params.0).await
    }

    #[tool(description = "Store a service-search result for a query, state, and city. Optional ttl_secs overrides the default lifetime.")]
    async fn cache_store(&self, params: Parameters<CacheStoreParams>) -> Result<CallToolResult, McpError> {
        store_impl(&self.cache, params.0).await
    }

    #[tool(description = "Hit rate, request counts, and response times over the last N days (default 7).")]
    async fn cache_stats(&self, params: Parameters<CacheStatsParams>) -> Result<CallToolResult, McpError> {
        stats_impl(&self.cache, params.0).await
    }

    #[tool(description = "Most frequently stored queries with their average result counts and states searched.")]
    async fn popular_queries(&self, params: Parameters<PopularQueriesParams>) -> Result<CallToolResult, McpError> {
        popular_impl(&self.cache, params.0).await
    }

    #[tool(description = "Remove expired cache entries, or all entries when expired_only is false.")]
    async fn cache_clear(&self, params: Parameters<CacheClearParams>) -> Result<CallToolResult, McpError> {
        clear_impl(&self.cache, params.0).await
    }

    #[tool(description = "Report cache status: healthy or degraded, memory tier size, and the last day's traffic.")]
    async fn cache_health(&self) -> Result<CallToolResult, McpError> {
        health_impl(&self.cache).await
    }
}

impl ServerHandler for QueryCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-querycache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
