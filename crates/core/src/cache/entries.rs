//! Cache entry CRUD operations.
//!
//! The persistent tier: durable storage of lookup results keyed by
//! fingerprint, with expiry filtering on read and bulk purges.

use super::connection::CacheDb;
use super::{CacheEntry, db_time, parse_db_time};
use crate::Error;
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Row as stored, before timestamp and payload decoding.
struct RawEntry {
    fingerprint: String,
    original_query: String,
    normalized_query: String,
    state: String,
    city: String,
    result_json: String,
    created_at: String,
    updated_at: String,
    expires_at: String,
    hit_count: i64,
    last_accessed_at: String,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            fingerprint: row.get(0)?,
            original_query: row.get(1)?,
            normalized_query: row.get(2)?,
            state: row.get(3)?,
            city: row.get(4)?,
            result_json: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            expires_at: row.get(8)?,
            hit_count: row.get(9)?,
            last_accessed_at: row.get(10)?,
        })
    }

    fn decode(self) -> Result<CacheEntry, Error> {
        let fingerprint = self.fingerprint;
        let corrupt = |reason: String| Error::CorruptEntry { fingerprint: fingerprint.clone(), reason };
        let time = |value: &str| parse_db_time(value).map_err(|e| corrupt(format!("bad timestamp {value:?}: {e}")));

        let result = serde_json::from_str(&self.result_json).map_err(|e| corrupt(format!("bad payload: {e}")))?;
        let created_at = time(&self.created_at)?;
        let updated_at = time(&self.updated_at)?;
        let expires_at = time(&self.expires_at)?;
        let last_accessed_at = time(&self.last_accessed_at)?;

        Ok(CacheEntry {
            fingerprint: fingerprint.clone(),
            original_query: self.original_query,
            normalized_query: self.normalized_query,
            state: self.state,
            city: self.city,
            result,
            created_at,
            updated_at,
            expires_at,
            hit_count: self.hit_count,
            last_accessed_at,
        })
    }
}

impl CacheDb {
    /// Insert or update a cache entry.
    ///
    /// Uses UPSERT semantics keyed by fingerprint. On conflict the payload,
    /// query text, and timestamps are replaced, `created_at` is kept, and the
    /// hit count never decreases.
    pub async fn upsert_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        let result_json = serde_json::to_string(&entry.result)?;
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (
                    fingerprint, original_query, normalized_query, state, city, result_json,
                    created_at, updated_at, expires_at, hit_count, last_accessed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(fingerprint) DO UPDATE SET
                    original_query = excluded.original_query,
                    normalized_query = excluded.normalized_query,
                    state = excluded.state,
                    city = excluded.city,
                    result_json = excluded.result_json,
                    updated_at = excluded.updated_at,
                    expires_at = excluded.expires_at,
                    hit_count = MAX(cache_entries.hit_count, excluded.hit_count),
                    last_accessed_at = excluded.last_accessed_at",
                    params![
                        &entry.fingerprint,
                        &entry.original_query,
                        &entry.normalized_query,
                        &entry.state,
                        &entry.city,
                        &result_json,
                        db_time(&entry.created_at),
                        db_time(&entry.updated_at),
                        db_time(&entry.expires_at),
                        entry.hit_count.max(1),
                        db_time(&entry.last_accessed_at),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a live entry by fingerprint.
    ///
    /// Returns None if the fingerprint doesn't exist or the entry has expired.
    /// Returns `Error::CorruptEntry` if the stored row cannot be decoded.
    pub async fn get_entry(&self, fingerprint: &str) -> Result<Option<CacheEntry>, Error> {
        self.get_entry_at(fingerprint, Utc::now()).await
    }

    pub(crate) async fn get_entry_at(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, Error> {
        let fingerprint = fingerprint.to_string();
        let now = db_time(&now);
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT
                    fingerprint, original_query, normalized_query, state, city, result_json,
                    created_at, updated_at, expires_at, hit_count, last_accessed_at
                FROM cache_entries WHERE fingerprint = ?1 AND expires_at > ?2",
                )?;

                match stmt.query_row(params![fingerprint, now], RawEntry::from_row) {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(RawEntry::decode).transpose()
    }

    /// Record a hit: increment `hit_count` and set `last_accessed_at`.
    ///
    /// Returns false if no entry with that fingerprint exists.
    pub async fn touch_entry(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        let fingerprint = fingerprint.to_string();
        let now = db_time(&now);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let updated = conn.execute(
                    "UPDATE cache_entries SET hit_count = hit_count + 1, last_accessed_at = ?2
                    WHERE fingerprint = ?1",
                    params![fingerprint, now],
                )?;
                Ok(updated > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a single entry, e.g. one whose payload is corrupt.
    pub async fn delete_entry(&self, fingerprint: &str) -> Result<bool, Error> {
        let fingerprint = fingerprint.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_entries WHERE fingerprint = ?1", params![fingerprint])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_entries(&self) -> Result<u64, Error> {
        let now = db_time(&Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE expires_at < ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_all_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored entries, live or expired.
    pub async fn count_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::fingerprint;
    use chrono::Duration;
    use serde_json::json;

    fn make_test_entry(query: &str, ttl: Duration) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            fingerprint: fingerprint(query, "CA", "Fresno"),
            original_query: query.to_string(),
            normalized_query: query.to_lowercase(),
            state: "CA".to_string(),
            city: "Fresno".to_string(),
            result: json!({ "services": [{ "name": "County Office" }] }),
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
            hit_count: 1,
            last_accessed_at: now,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_test_entry("passport application", Duration::hours(1));

        db.upsert_entry(&entry).await.unwrap();

        let retrieved = db.get_entry(&entry.fingerprint).await.unwrap().unwrap();
        assert_eq!(retrieved.original_query, entry.original_query);
        assert_eq!(retrieved.result, entry.result);
        assert_eq!(retrieved.hit_count, 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.get_entry("nonexistent").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_filters_expired() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_test_entry("passport application", Duration::minutes(10));
        db.upsert_entry(&entry).await.unwrap();

        let later = Utc::now() + Duration::minutes(20);
        assert!(db.get_entry_at(&entry.fingerprint, later).await.unwrap().is_none());
        assert_eq!(db.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_payload_keeps_hits() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut entry = make_test_entry("passport application", Duration::hours(1));
        db.upsert_entry(&entry).await.unwrap();
        db.touch_entry(&entry.fingerprint, Utc::now()).await.unwrap();

        entry.result = json!({ "services": [] });
        db.upsert_entry(&entry).await.unwrap();

        let retrieved = db.get_entry(&entry.fingerprint).await.unwrap().unwrap();
        assert_eq!(retrieved.result, json!({ "services": [] }));
        assert_eq!(retrieved.hit_count, 2);
        assert_eq!(db.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_touch_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_test_entry("birth certificate", Duration::hours(1));
        db.upsert_entry(&entry).await.unwrap();

        let now = Utc::now() + Duration::seconds(5);
        assert!(db.touch_entry(&entry.fingerprint, now).await.unwrap());
        assert!(db.touch_entry(&entry.fingerprint, now).await.unwrap());
        assert!(!db.touch_entry("nonexistent", now).await.unwrap());

        let retrieved = db.get_entry(&entry.fingerprint).await.unwrap().unwrap();
        assert_eq!(retrieved.hit_count, 3);
        assert_eq!(retrieved.last_accessed_at.timestamp_micros(), now.timestamp_micros());
    }

    #[tokio::test]
    async fn test_purge_expired_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.upsert_entry(&make_test_entry("expiring", Duration::seconds(1)))
            .await
            .unwrap();
        db.upsert_entry(&make_test_entry("fresh", Duration::hours(1)))
            .await
            .unwrap();

        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

        let deleted = db.purge_expired_entries().await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.count_entries().await.unwrap(), 1);
        assert!(db
            .get_entry(&fingerprint("fresh", "CA", "Fresno"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_purge_all_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.upsert_entry(&make_test_entry("one", Duration::hours(1))).await.unwrap();
        db.upsert_entry(&make_test_entry("two", Duration::hours(1))).await.unwrap();

        assert_eq!(db.purge_all_entries().await.unwrap(), 2);
        assert_eq!(db.count_entries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_payload() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_test_entry("passport application", Duration::hours(1));
        db.upsert_entry(&entry).await.unwrap();

        let key = entry.fingerprint.clone();
        db.conn
            .call(move |conn| {
                conn.execute("UPDATE cache_entries SET result_json = '{not json' WHERE fingerprint = ?1", [key])
            })
            .await
            .unwrap();

        let result = db.get_entry(&entry.fingerprint).await;
        assert!(matches!(result, Err(Error::CorruptEntry { .. })));

        assert!(db.delete_entry(&entry.fingerprint).await.unwrap());
        assert!(db.get_entry(&entry.fingerprint).await.unwrap().is_none());
    }
}
