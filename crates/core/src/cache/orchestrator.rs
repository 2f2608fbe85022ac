//! Cache lifecycle and the lookup/store paths.
//!
//! [`QueryCache`] owns both tiers, the cleanup jobs, and the health counters.
//! Construct one at startup, share it behind an `Arc`, and call
//! [`QueryCache::shutdown`] before exit.
//!
//! Every persistent-tier failure is logged, counted, and treated as a miss or
//! a no-op. The only error a caller of `lookup` or `store` sees is
//! `Error::InvalidInput`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cleanup::{CleanupScheduler, sweep_memory};
use super::connection::CacheDb;
use super::hash::fingerprint_normalized;
use super::memory::MemoryTier;
use super::normalize::normalize_query;
use super::popular::PopularQueryRecord;
use super::stats::{StatsReport, summarize_rows};
use super::{CacheEntry, Error, bounded};
use crate::config::AppConfig;

/// Tier that produced a hit. Also the order in which lookups are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitSource {
    Memory,
    Persistent,
    Synonym,
}

impl HitSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitSource::Memory => "memory",
            HitSource::Persistent => "persistent",
            HitSource::Synonym => "synonym",
        }
    }
}

impl std::fmt::Display for HitSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const LOOKUP_CHAIN: [HitSource; 3] = [HitSource::Memory, HitSource::Persistent, HitSource::Synonym];

/// A successful lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHit {
    pub source: HitSource,
    /// Fingerprint of the request, which differs from `entry.fingerprint`
    /// after a synonym rewrite.
    pub fingerprint: String,
    pub entry: CacheEntry,
}

impl CacheHit {
    pub fn result(&self) -> &Value {
        &self.entry.result
    }
}

/// Outcome of a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreReceipt {
    pub fingerprint: String,
    /// False when the write-through to the persistent tier failed or was skipped.
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `"healthy"` or `"degraded"`.
    pub status: String,
    pub initialized: bool,
    pub memory_tier_size: usize,
    /// Lookups recorded today and yesterday (UTC).
    pub last_24h_requests: i64,
    /// Hit rate over the same two days, e.g. `"70.00"`.
    pub hit_rate_24h: String,
    pub persistent_errors: u64,
}

struct LookupContext<'a> {
    normalized: &'a str,
    state: &'a str,
    city: &'a str,
    fingerprint: &'a str,
}

/// Number of results in a payload, for popularity tracking.
///
/// A top-level array counts its elements; an object counts its `services`
/// or `results` array; `null` counts as zero; anything else as one.
pub fn result_count(result: &Value) -> usize {
    match result {
        Value::Array(items) => items.len(),
        Value::Object(map) => ["services", "results"]
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_array))
            .map_or(1, Vec::len),
        Value::Null => 0,
        _ => 1,
    }
}

fn validate(query: &str, state: &str, city: &str) -> Result<String, Error> {
    for (field, value) in [("query", query), ("state", state), ("city", city)] {
        if value.trim().is_empty() {
            return Err(Error::InvalidInput(format!("{field} is required")));
        }
    }
    let normalized = normalize_query(query);
    if normalized.is_empty() {
        return Err(Error::InvalidInput("query must contain at least one searchable word".into()));
    }
    Ok(normalized)
}

/// The two-tier query cache.
pub struct QueryCache {
    config: AppConfig,
    db: RwLock<Option<CacheDb>>,
    memory: Arc<MemoryTier>,
    initialized: bool,
    errors: Arc<AtomicU64>,
    scheduler: Mutex<Option<CleanupScheduler>>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("initialized", &self.initialized)
            .field("memory_tier_size", &self.memory.len())
            .field("persistent_errors", &self.errors.load(Ordering::Relaxed))
            .finish()
    }
}

impl QueryCache {
    /// Open the persistent tier and start the cleanup jobs.
    ///
    /// Never fails: if the database cannot be opened the cache runs in
    /// degraded mode with the memory tier only.
    pub async fn init(config: AppConfig) -> Self {
        let db = match config.require_db_path() {
            Ok(path) => bounded("open", config.io_timeout(), CacheDb::open(path)).await,
            Err(e) => Err(Error::Unavailable(e.to_string())),
        };

        match db {
            Ok(db) => {
                tracing::info!(db_path = %config.db_path_display(), "query cache initialized");
                Self::with_db(Some(db), config)
            }
            Err(e) => {
                tracing::error!(
                    db_path = %config.db_path_display(),
                    error = %e,
                    "persistent tier unavailable; running without a persistent cache"
                );
                Self::with_db(None, config)
            }
        }
    }

    /// Build a cache around an already opened database, or none for degraded mode.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_db(db: Option<CacheDb>, config: AppConfig) -> Self {
        let memory = Arc::new(MemoryTier::new(config.memory_capacity));
        let errors = Arc::new(AtomicU64::new(0));
        let initialized = db.is_some();

        let scheduler = CleanupScheduler::start(
            db.clone(),
            Arc::clone(&memory),
            Arc::clone(&errors),
            config.persistent_sweep_interval(),
            config.memory_sweep_interval(),
            config.io_timeout(),
        );

        Self {
            config,
            db: RwLock::new(db),
            memory,
            initialized,
            errors,
            scheduler: Mutex::new(Some(scheduler)),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    /// Handle to the persistent tier, if one is open.
    pub fn db(&self) -> Option<CacheDb> {
        self.db.read().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn note_failure(&self, operation: &'static str, err: &Error) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(operation, error = %err, "persistent tier call failed; continuing without it");
    }

    /// Read a live entry from the persistent tier. Failures read as a miss.
    async fn persistent_get(&self, fingerprint: &str) -> Option<CacheEntry> {
        let db = self.db()?;
        match bounded("get_entry", self.config.io_timeout(), db.get_entry(fingerprint)).await {
            Ok(entry) => entry,
            Err(e @ Error::CorruptEntry { .. }) => {
                self.note_failure("get_entry", &e);
                if let Err(e) = bounded("delete_entry", self.config.io_timeout(), db.delete_entry(fingerprint)).await {
                    self.note_failure("delete_entry", &e);
                }
                None
            }
            Err(e) => {
                self.note_failure("get_entry", &e);
                None
            }
        }
    }

    async fn attempt(&self, strategy: HitSource, ctx: &LookupContext<'_>) -> Option<CacheEntry> {
        match strategy {
            HitSource::Memory => self.memory.get(ctx.fingerprint),
            HitSource::Persistent => self.persistent_get(ctx.fingerprint).await,
            HitSource::Synonym => {
                let db = self.db()?;
                let resolved = match bounded("resolve_synonym", self.config.io_timeout(), db.resolve_synonym(ctx.normalized))
                    .await
                {
                    Ok(resolved) => resolved?,
                    Err(e) => {
                        self.note_failure("resolve_synonym", &e);
                        return None;
                    }
                };
                let alternate = fingerprint_normalized(&resolved, ctx.state, ctx.city);
                if alternate == ctx.fingerprint {
                    return None;
                }
                self.persistent_get(&alternate).await
            }
        }
    }

    /// Look up a cached result for a query at a location.
    ///
    /// Tries the memory tier, the persistent tier, then one synonym rewrite
    /// against the persistent tier. Any hit is counted and promoted into the
    /// memory tier. Every completed lookup is recorded in the daily stats.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if query, state, or city is blank.
    pub async fn lookup(&self, query: &str, state: &str, city: &str) -> Result<Option<CacheHit>, Error> {
        let started = Instant::now();
        let normalized = validate(query, state, city)?;
        let fingerprint = fingerprint_normalized(&normalized, state, city);
        let ctx = LookupContext { normalized: &normalized, state, city, fingerprint: &fingerprint };

        let mut found = None;
        for strategy in LOOKUP_CHAIN {
            if let Some(entry) = self.attempt(strategy, &ctx).await {
                found = Some((strategy, entry));
                break;
            }
            tracing::debug!(fingerprint = %fingerprint, tier = %strategy, "lookup miss");
        }

        let hit = match found {
            Some((source, entry)) => Some(self.complete_hit(source, &fingerprint, entry).await),
            None => None,
        };

        self.record_outcome(hit.is_some(), started.elapsed()).await;

        match &hit {
            Some(hit) => tracing::debug!(fingerprint = %fingerprint, tier = %hit.source, "cache hit"),
            None => tracing::debug!(fingerprint = %fingerprint, query = %normalized, "cache miss"),
        }

        Ok(hit)
    }

    async fn complete_hit(&self, source: HitSource, fingerprint: &str, mut entry: CacheEntry) -> CacheHit {
        let now = Utc::now();

        if let Some(db) = self.db() {
            if let Err(e) = bounded("touch_entry", self.config.io_timeout(), db.touch_entry(&entry.fingerprint, now)).await {
                self.note_failure("touch_entry", &e);
            }
        }

        entry.hit_count += 1;
        entry.last_accessed_at = now;

        match source {
            HitSource::Memory => self.memory.record_hit(fingerprint, now),
            HitSource::Persistent | HitSource::Synonym => {
                self.memory.put(fingerprint, entry.clone());
            }
        }

        CacheHit { source, fingerprint: fingerprint.to_string(), entry }
    }

    async fn record_outcome(&self, was_hit: bool, elapsed: Duration) {
        let Some(db) = self.db() else {
            return;
        };
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        if let Err(e) = bounded("record_outcome", self.config.io_timeout(), db.record_outcome(was_hit, elapsed_ms)).await {
            self.note_failure("record_outcome", &e);
        }
    }

    /// Store a fresh result with the configured default TTL.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if query, state, or city is blank.
    pub async fn store(&self, query: &str, state: &str, city: &str, result: Value) -> Result<StoreReceipt, Error> {
        self.store_with_ttl(query, state, city, result, self.config.ttl())
            .await
    }

    /// Store a fresh result that expires after `ttl`.
    ///
    /// Writes through to the persistent tier, then the memory tier, then
    /// records the query's popularity. Does not touch the daily stats.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if query, state, or city is blank or
    /// `ttl` is zero or out of range.
    pub async fn store_with_ttl(
        &self, query: &str, state: &str, city: &str, result: Value, ttl: Duration,
    ) -> Result<StoreReceipt, Error> {
        let normalized = validate(query, state, city)?;
        let ttl = chrono::Duration::from_std(ttl)
            .ok()
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .ok_or_else(|| Error::InvalidInput("ttl must be positive".into()))?;

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| Error::InvalidInput("ttl is out of range".into()))?;
        let fingerprint = fingerprint_normalized(&normalized, state, city);
        let count = result_count(&result);

        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            original_query: query.trim().to_string(),
            normalized_query: normalized.clone(),
            state: state.trim().to_string(),
            city: city.trim().to_string(),
            result,
            created_at: now,
            updated_at: now,
            expires_at,
            hit_count: 1,
            last_accessed_at: now,
        };

        let db = self.db();
        let mut persisted = false;
        if let Some(db) = &db {
            match bounded("upsert_entry", self.config.io_timeout(), db.upsert_entry(&entry)).await {
                Ok(()) => persisted = true,
                Err(e) => self.note_failure("upsert_entry", &e),
            }
        }

        self.memory.put(fingerprint.clone(), entry);

        if let Some(db) = &db {
            if let Err(e) = bounded("record_popular", self.config.io_timeout(), db.record_popular(&normalized, state, count)).await {
                self.note_failure("record_popular", &e);
            }
        }

        tracing::debug!(fingerprint = %fingerprint, query = %normalized, persisted, "stored result");
        Ok(StoreReceipt { fingerprint, persisted })
    }

    /// Hit/miss summary and per-day rows for the trailing `days` days.
    ///
    /// Reports zeros when the persistent tier is unavailable.
    pub async fn stats(&self, days: u32) -> StatsReport {
        let days = days.max(1);
        let empty = || StatsReport { summary: summarize_rows(days, &[]), daily: Vec::new() };
        let Some(db) = self.db() else {
            return empty();
        };
        match bounded("summarize_stats", self.config.io_timeout(), db.summarize_stats(days)).await {
            Ok(report) => report,
            Err(e) => {
                self.note_failure("summarize_stats", &e);
                empty()
            }
        }
    }

    /// Most searched queries, at most `limit`.
    pub async fn popular_queries(&self, limit: usize) -> Vec<PopularQueryRecord> {
        let Some(db) = self.db() else {
            return Vec::new();
        };
        match bounded("top_queries", self.config.io_timeout(), db.top_queries(limit)).await {
            Ok(records) => records,
            Err(e) => {
                self.note_failure("top_queries", &e);
                Vec::new()
            }
        }
    }

    /// Remove expired entries from both tiers.
    ///
    /// Returns the number of persistent rows deleted.
    pub async fn clear_expired(&self) -> u64 {
        sweep_memory(&self.memory);
        let Some(db) = self.db() else {
            return 0;
        };
        match super::cleanup::sweep_persistent(&db, self.config.io_timeout()).await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.note_failure("purge_expired_entries", &e);
                0
            }
        }
    }

    /// Remove every entry from both tiers.
    ///
    /// Returns false if the persistent tier could not be cleared.
    pub async fn clear_all(&self) -> bool {
        self.memory.clear();
        let Some(db) = self.db() else {
            return true;
        };
        match bounded("purge_all_entries", self.config.io_timeout(), db.purge_all_entries()).await {
            Ok(deleted) => {
                tracing::info!(deleted, "cleared all cache entries");
                true
            }
            Err(e) => {
                self.note_failure("purge_all_entries", &e);
                false
            }
        }
    }

    /// Current status for operators.
    ///
    /// Degraded when the persistent tier never opened or any persistent call
    /// has failed since start. Traffic figures cover today and yesterday
    /// (UTC), so the trailing 24 hours are always included.
    pub async fn health(&self) -> HealthReport {
        let recent = self.stats(2).await.summary;
        let persistent_errors = self.errors.load(Ordering::Relaxed);
        let available = self.initialized && self.db.read().is_some();
        let status = if available && persistent_errors == 0 { "healthy" } else { "degraded" };

        HealthReport {
            status: status.to_string(),
            initialized: self.initialized,
            memory_tier_size: self.memory.len(),
            last_24h_requests: recent.total_requests,
            hit_rate_24h: recent.hit_rate,
            persistent_errors,
        }
    }

    /// Stop the cleanup jobs, then release the persistent tier.
    ///
    /// Later calls behave as in degraded mode. Calling twice is a no-op.
    pub async fn shutdown(&self) {
        let scheduler = self.scheduler.lock().take();
        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
        }
        if self.db.write().take().is_some() {
            tracing::info!("persistent tier released");
        }
    }
}
