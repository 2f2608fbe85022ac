//! Two-tier query-result cache.
//!
//! Lookups go through a bounded in-memory tier, then a SQLite-backed
//! persistent tier accessed via tokio-rusqlite, then a single synonym-rewrite
//! retry against the persistent tier. It also provides:
//!
//! - SHA-256 fingerprints over the normalized query and location
//! - Automatic schema migrations
//! - Daily hit/miss statistics and popular-query tracking
//! - Background expiry sweeps for both tiers

pub mod cleanup;
pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod normalize;
pub mod orchestrator;
pub mod popular;
pub mod stats;
pub mod synonyms;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub use crate::Error;

pub use cleanup::CleanupScheduler;
pub use connection::CacheDb;
pub use memory::MemoryTier;
pub use orchestrator::{CacheHit, HealthReport, HitSource, QueryCache, StoreReceipt};
pub use popular::PopularQueryRecord;
pub use stats::{DailyStat, StatsReport, StatsSummary};
pub use synonyms::SynonymMapping;

/// A cached lookup result.
///
/// The persistent tier is authoritative; the memory tier holds clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub original_query: String,
    pub normalized_query: String,
    pub state: String,
    pub city: String,
    pub result: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: i64,
    pub last_accessed_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Format a timestamp for storage.
///
/// Fixed width (microseconds, `Z` suffix) so that string comparison in SQL
/// matches chronological order.
pub(crate) fn db_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_db_time(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc))
}

/// Run a persistent-tier call with an upper bound on its duration.
pub(crate) async fn bounded<T, F>(op: &'static str, limit: std::time::Duration, fut: F) -> Result<T, Error>
where
    F: std::future::Future<Output = Result<T, Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!("{op} exceeded {}ms", limit.as_millis()))),
    }
}
