//! Synonym mappings and one-hop query rewriting.
//!
//! A mapping says that `synonym_query` is an alternate phrasing of
//! `base_query`. Both sides are stored normalized. Resolution rewrites one
//! whole-word occurrence of the best-matching synonym phrase and never
//! follows the result further.

use super::connection::CacheDb;
use super::normalize::normalize_query;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored synonym mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynonymMapping {
    pub base_query: String,
    pub synonym_query: String,
    pub confidence_score: f64,
    pub is_active: bool,
}

/// Replace the first whole-word occurrence of `phrase` in `query` with `replacement`.
fn replace_phrase(query: &str, phrase: &str, replacement: &str) -> Option<String> {
    let padded = format!(" {query} ");
    let needle = format!(" {phrase} ");
    if !padded.contains(&needle) {
        return None;
    }
    let rewritten = padded.replacen(&needle, &format!(" {replacement} "), 1);
    Some(rewritten.split_whitespace().collect::<Vec<_>>().join(" "))
}

impl CacheDb {
    /// Find the best active mapping whose synonym appears in the query.
    ///
    /// Matches the whole query or a whole-word phrase inside it. Highest
    /// confidence wins; ties prefer the longer synonym phrase.
    pub async fn best_synonym_match(&self, normalized_query: &str) -> Result<Option<SynonymMapping>, Error> {
        let query = normalized_query.to_string();
        self.conn
            .call(move |conn| -> Result<Option<SynonymMapping>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT base_query, synonym_query, confidence_score, is_active
                FROM synonyms
                WHERE is_active = 1
                  AND synonym_query != ''
                  AND instr(' ' || ?1 || ' ', ' ' || synonym_query || ' ') > 0
                ORDER BY confidence_score DESC, length(synonym_query) DESC
                LIMIT 1",
                )?;

                let result = stmt.query_row(params![query], |row| {
                    Ok(SynonymMapping {
                        base_query: row.get(0)?,
                        synonym_query: row.get(1)?,
                        confidence_score: row.get(2)?,
                        is_active: row.get::<_, i32>(3)? == 1,
                    })
                });

                match result {
                    Ok(m) => Ok(Some(m)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Resolve a normalized query to its canonical phrasing.
    ///
    /// Returns None when no active mapping applies or the rewrite would not
    /// change the query.
    pub async fn resolve_synonym(&self, normalized_query: &str) -> Result<Option<String>, Error> {
        let Some(mapping) = self.best_synonym_match(normalized_query).await? else {
            return Ok(None);
        };

        let resolved = replace_phrase(normalized_query, &mapping.synonym_query, &mapping.base_query)
            .filter(|rewritten| rewritten != normalized_query);

        if let Some(rewritten) = &resolved {
            tracing::debug!(
                query = normalized_query,
                resolved = %rewritten,
                confidence = mapping.confidence_score,
                "resolved synonym"
            );
        }

        Ok(resolved)
    }

    /// Add or update a synonym mapping.
    ///
    /// Both phrases are normalized and confidence is clamped to [0, 1].
    pub async fn add_synonym(&self, base_query: &str, synonym_query: &str, confidence: f64) -> Result<(), Error> {
        let base = normalize_query(base_query);
        let synonym = normalize_query(synonym_query);
        if base.is_empty() || synonym.is_empty() {
            return Err(Error::InvalidInput("synonym and base query must not be empty".into()));
        }
        let confidence = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO synonyms (base_query, synonym_query, confidence_score, is_active)
                    VALUES (?1, ?2, ?3, 1)
                    ON CONFLICT(base_query, synonym_query) DO UPDATE SET
                        confidence_score = excluded.confidence_score,
                        is_active = 1",
                    params![base, synonym, confidence],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Enable or disable every mapping for a synonym phrase.
    ///
    /// Returns the number of mappings changed.
    pub async fn set_synonym_active(&self, synonym_query: &str, active: bool) -> Result<u64, Error> {
        let synonym = normalize_query(synonym_query);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "UPDATE synonyms SET is_active = ?2 WHERE synonym_query = ?1",
                    params![synonym, active as i32],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_phrase_whole_word() {
        assert_eq!(replace_phrase("dl renewal", "dl", "driving license").as_deref(), Some("driving license renewal"));
        assert_eq!(replace_phrase("dl", "dl", "driving license").as_deref(), Some("driving license"));
        assert!(replace_phrase("dlx renewal", "dl", "driving license").is_none());
        assert!(replace_phrase("handle", "dl", "driving license").is_none());
    }

    #[test]
    fn test_replace_phrase_only_once() {
        assert_eq!(replace_phrase("dl dl", "dl", "driving license").as_deref(), Some("driving license dl"));
    }

    #[tokio::test]
    async fn test_resolve_seeded_synonym() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let resolved = db.resolve_synonym("dl renewal").await.unwrap();
        assert_eq!(resolved.as_deref(), Some("driving license renewal"));
    }

    #[tokio::test]
    async fn test_resolve_no_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.resolve_synonym("passport application").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_picks_highest_confidence() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.add_synonym("permit", "license", 0.4).await.unwrap();
        db.add_synonym("fishing license", "fish license", 0.9).await.unwrap();

        let resolved = db.resolve_synonym("fish license fee").await.unwrap();
        assert_eq!(resolved.as_deref(), Some("fishing license fee"));
    }

    #[tokio::test]
    async fn test_resolve_single_level() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.add_synonym("beta", "alpha", 0.9).await.unwrap();
        db.add_synonym("gamma", "beta", 0.9).await.unwrap();

        let resolved = db.resolve_synonym("alpha").await.unwrap();
        assert_eq!(resolved.as_deref(), Some("beta"));
    }

    #[tokio::test]
    async fn test_inactive_mapping_ignored() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert_eq!(db.set_synonym_active("dl", false).await.unwrap(), 1);
        assert!(db.resolve_synonym("dl renewal").await.unwrap().is_none());

        db.set_synonym_active("dl", true).await.unwrap();
        assert!(db.resolve_synonym("dl renewal").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_add_synonym_rejects_empty() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.add_synonym("the", "passport", 0.5).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_add_synonym_clamps_confidence() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.add_synonym("identification card", "id", 7.5).await.unwrap();
        let mapping = db.best_synonym_match("id card").await.unwrap().unwrap();
        assert_eq!(mapping.base_query, "identification card");
        assert!((mapping.confidence_score - 1.0).abs() < f64::EPSILON);
    }
}
