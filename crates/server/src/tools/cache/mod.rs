//! Cache MCP tools.
//!
//! Thin wrappers over `QueryCache`: lookup and store for the request path,
//! the rest for operators.

pub mod clear;
pub mod health;
pub mod lookup;
pub mod popular;
pub mod stats;
pub mod store;

pub use clear::{CacheClearParams, clear_impl};
pub use health::health_impl;
pub use lookup::{CacheLookupParams, lookup_impl};
pub use popular::{PopularQueriesParams, popular_impl};
pub use stats::{CacheStatsParams, stats_impl};
pub use store::{CacheStoreParams, store_impl};
