//! Core of the service-lookup query cache.
//!
//! This crate provides:
//! - A two-tier cache (bounded in-memory LRU over a SQLite store)
//! - Query normalization, fingerprinting, and one-hop synonym resolution
//! - Daily hit/miss statistics and popular-query tracking
//! - Background expiry sweeps tied to the cache lifecycle
//! - Layered configuration and unified error types

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheEntry, CacheHit, HealthReport, HitSource, QueryCache, StoreReceipt};
pub use config::AppConfig;
pub use error::Error;
