//! mcp-querycache server entry point.
//!
//! Boots the query cache and serves it as an MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use querycache_core::{AppConfig, QueryCache};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        db_path = %config.db_path_display(),
        memory_capacity = config.memory_capacity,
        ttl_secs = config.ttl_secs,
        "Starting mcp-querycache server on stdio transport"
    );

    let cache = Arc::new(QueryCache::init(config).await);

    let handler = handler::QueryCacheServer::new(Arc::clone(&cache));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    let outcome = server.waiting().await;

    cache.shutdown().await;
    tracing::info!("mcp-querycache server stopped");

    outcome?;
    Ok(())
}
