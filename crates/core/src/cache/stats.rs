//! Daily hit/miss statistics.
//!
//! One row per UTC calendar day, upserted after every completed lookup.

use super::connection::CacheDb;
use crate::Error;
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Counters for a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    pub total_requests: i64,
    pub cache_hits: i64,
    pub cache_misses: i64,
    pub api_calls_saved: i64,
    pub avg_response_time_ms: f64,
}

/// Aggregate over a trailing window of days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub days: u32,
    pub total_requests: i64,
    pub cache_hits: i64,
    pub cache_misses: i64,
    pub api_calls_saved: i64,
    /// Percentage with two decimals, e.g. `"70.00"`.
    pub hit_rate: String,
    /// Unweighted mean of the per-day averages.
    pub avg_response_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub summary: StatsSummary,
    /// Newest day first.
    pub daily: Vec<DailyStat>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build the window summary from per-day rows.
///
/// The response-time figure is the mean of daily means, not weighted by
/// request volume.
pub(crate) fn summarize_rows(days: u32, daily: &[DailyStat]) -> StatsSummary {
    let total_requests: i64 = daily.iter().map(|d| d.total_requests).sum();
    let cache_hits: i64 = daily.iter().map(|d| d.cache_hits).sum();
    let cache_misses: i64 = daily.iter().map(|d| d.cache_misses).sum();
    let api_calls_saved: i64 = daily.iter().map(|d| d.api_calls_saved).sum();

    let hit_rate = if total_requests > 0 { cache_hits as f64 / total_requests as f64 * 100.0 } else { 0.0 };

    let avg_response_time_ms = if daily.is_empty() {
        0.0
    } else {
        daily.iter().map(|d| d.avg_response_time_ms).sum::<f64>() / daily.len() as f64
    };

    StatsSummary {
        days,
        total_requests,
        cache_hits,
        cache_misses,
        api_calls_saved,
        hit_rate: format!("{hit_rate:.2}"),
        avg_response_time_ms: round2(avg_response_time_ms),
    }
}

impl CacheDb {
    /// Record one completed lookup against today's row.
    pub async fn record_outcome(&self, was_hit: bool, response_time_ms: f64) -> Result<(), Error> {
        self.record_outcome_on(Utc::now().date_naive(), was_hit, response_time_ms)
            .await
    }

    /// Record one completed lookup against the row for `date`.
    ///
    /// A hit also counts as one saved external call. The average response
    /// time is updated incrementally: `(old * n + sample) / (n + 1)`.
    pub(crate) async fn record_outcome_on(
        &self, date: NaiveDate, was_hit: bool, response_time_ms: f64,
    ) -> Result<(), Error> {
        let date = date.format("%Y-%m-%d").to_string();
        let hit = i64::from(was_hit);
        let miss = 1 - hit;
        let sample = if response_time_ms.is_finite() { response_time_ms.max(0.0) } else { 0.0 };

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO daily_stats (
                    date, total_requests, cache_hits, cache_misses, api_calls_saved, avg_response_time_ms
                ) VALUES (?1, 1, ?2, ?3, ?2, ?4)
                ON CONFLICT(date) DO UPDATE SET
                    avg_response_time_ms = (daily_stats.avg_response_time_ms * daily_stats.total_requests
                        + excluded.avg_response_time_ms) / (daily_stats.total_requests + 1),
                    total_requests = daily_stats.total_requests + 1,
                    cache_hits = daily_stats.cache_hits + excluded.cache_hits,
                    cache_misses = daily_stats.cache_misses + excluded.cache_misses,
                    api_calls_saved = daily_stats.api_calls_saved + excluded.api_calls_saved",
                    params![date, hit, miss, sample],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Daily rows for the trailing `days` calendar days, today included.
    pub async fn daily_stats(&self, days: u32) -> Result<Vec<DailyStat>, Error> {
        self.daily_stats_until(Utc::now().date_naive(), days).await
    }

    pub(crate) async fn daily_stats_until(&self, today: NaiveDate, days: u32) -> Result<Vec<DailyStat>, Error> {
        let days = days.max(1);
        let start = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN)
            .format("%Y-%m-%d")
            .to_string();
        let end = today.format("%Y-%m-%d").to_string();

        self.conn
            .call(move |conn| -> Result<Vec<DailyStat>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT date, total_requests, cache_hits, cache_misses, api_calls_saved, avg_response_time_ms
                FROM daily_stats WHERE date >= ?1 AND date <= ?2
                ORDER BY date DESC",
                )?;

                let rows = stmt.query_map(params![start, end], |row| {
                    Ok(DailyStat {
                        date: row.get(0)?,
                        total_requests: row.get(1)?,
                        cache_hits: row.get(2)?,
                        cache_misses: row.get(3)?,
                        api_calls_saved: row.get(4)?,
                        avg_response_time_ms: row.get(5)?,
                    })
                })?;

                let mut daily = Vec::new();
                for row in rows {
                    daily.push(row?);
                }
                Ok(daily)
            })
            .await
            .map_err(Error::from)
    }

    /// Summary and per-day rows for the trailing `days` calendar days.
    pub async fn summarize_stats(&self, days: u32) -> Result<StatsReport, Error> {
        let days = days.max(1);
        let daily = self.daily_stats(days).await?;
        Ok(StatsReport { summary: summarize_rows(days, &daily), daily })
    }
}
