//! Popular query tracking.
//!
//! Updated on every store, not on lookups.

use std::collections::BTreeSet;

use super::connection::CacheDb;
use super::{db_time, parse_db_time};
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// Usage record for a normalized query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularQueryRecord {
    pub normalized_query: String,
    pub search_count: i64,
    /// Two-point smoothed: each new sample is averaged with the previous value.
    pub avg_results: f64,
    pub states_searched: BTreeSet<String>,
    pub last_searched_at: DateTime<Utc>,
}

fn decode_states(json: &str) -> BTreeSet<String> {
    serde_json::from_str(json).unwrap_or_default()
}

impl CacheDb {
    /// Record a stored result for a normalized query.
    ///
    /// First sighting inserts `search_count = 1, avg_results = result_count`.
    /// Later sightings increment the count, merge the state into the set, and
    /// set `avg_results = (old + result_count) / 2`. States are stored
    /// uppercased, matching the case-insensitive fingerprint.
    pub async fn record_popular(&self, normalized_query: &str, state: &str, result_count: usize) -> Result<(), Error> {
        self.record_popular_at(normalized_query, state, result_count, Utc::now())
            .await
    }

    pub(crate) async fn record_popular_at(
        &self, normalized_query: &str, state: &str, result_count: usize, now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let query = normalized_query.to_string();
        let state = state.trim().to_uppercase();
        let count = result_count as f64;
        let now = db_time(&now);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;

                let existing: Option<(f64, String)> = tx
                    .query_row(
                        "SELECT avg_results, states_searched FROM popular_queries WHERE normalized_query = ?1",
                        params![query],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                match existing {
                    None => {
                        let states = serde_json::to_string(&BTreeSet::from([state]))?;
                        tx.execute(
                            "INSERT INTO popular_queries (
                            normalized_query, search_count, avg_results, states_searched, last_searched_at
                        ) VALUES (?1, 1, ?2, ?3, ?4)",
                            params![query, count, states, now],
                        )?;
                    }
                    Some((old_avg, states_json)) => {
                        let mut states = decode_states(&states_json);
                        states.insert(state);
                        let states = serde_json::to_string(&states)?;
                        tx.execute(
                            "UPDATE popular_queries SET
                            search_count = search_count + 1,
                            avg_results = ?2,
                            states_searched = ?3,
                            last_searched_at = ?4
                        WHERE normalized_query = ?1",
                            params![query, (old_avg + count) / 2.0, states, now],
                        )?;
                    }
                }

                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Most searched queries, ties broken by most recent search.
    pub async fn top_queries(&self, limit: usize) -> Result<Vec<PopularQueryRecord>, Error> {
        let limit = limit as i64;
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(String, i64, f64, String, String)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT normalized_query, search_count, avg_results, states_searched, last_searched_at
                FROM popular_queries
                ORDER BY search_count DESC, last_searched_at DESC
                LIMIT ?1",
                )?;

                let rows = stmt.query_map(params![limit], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?;

                rows.collect::<Result<Vec<_>, rusqlite::Error>>().map_err(Error::from)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(normalized_query, search_count, avg_results, states, last)| {
                let last_searched_at = parse_db_time(&last).map_err(|e| Error::CorruptEntry {
                    fingerprint: normalized_query.clone(),
                    reason: format!("bad timestamp {last:?}: {e}"),
                })?;
                Ok(PopularQueryRecord {
                    normalized_query,
                    search_count,
                    avg_results,
                    states_searched: decode_states(&states),
                    last_searched_at,
                })
            })
            .collect()
    }
}
