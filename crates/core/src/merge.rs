//! Incremental merge of scraped candidates into the collection.
//!
//! Merging is append-only: a candidate whose identity key is already present
//! is skipped, the first occurrence of a key inside a batch wins, and records
//! already in the collection are never reordered, updated or removed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::{collection::Collection, error::ExtractError, models::GameRecord};

/// Default upper bound on candidates merged per run.
pub const DEFAULT_MAX_BATCH: usize = 100;

/// Counts reported after a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Candidates appended to the collection.
    pub added: usize,
    /// Candidates discarded because their key was already present.
    pub skipped: usize,
    /// Candidates rejected for missing required fields.
    pub rejected: usize,
    /// Candidates beyond the batch limit that were not considered.
    pub truncated: usize,
    /// Collection length after the merge.
    pub total: usize,
}

/// Appends novel candidates to a collection.
#[derive(Debug, Clone)]
pub struct Merger {
    max_batch: usize,
    now: Option<DateTime<Utc>>,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH)
    }
}

impl Merger {
    /// Create a merger that considers at most `max_batch` candidates per call.
    pub fn new(max_batch: usize) -> Self {
        Self {
            max_batch,
            now: None,
        }
    }

    /// Use a fixed insertion timestamp instead of the wall clock.
    pub fn with_timestamp(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Merge `candidates` into `collection` in order.
    pub fn merge(
        &self,
        collection: &mut Collection,
        candidates: impl IntoIterator<Item = GameRecord>,
    ) -> MergeSummary {
        let now = self.now.unwrap_or_else(Utc::now);
        let mut keys = collection.identity_keys();
        let mut summary = MergeSummary::default();

        for (index, mut candidate) in candidates.into_iter().enumerate() {
            if index >= self.max_batch {
                summary.truncated += 1;
                continue;
            }

            if let Err(err) = validate(&candidate) {
                debug!("rejecting candidate {:?}: {err}", candidate.source_url);
                summary.rejected += 1;
                continue;
            }

            let Some(key) = candidate.identity_key() else {
                debug!("rejecting candidate {:?}: no identity key", candidate.title);
                summary.rejected += 1;
                continue;
            };

            if !keys.insert(key) {
                debug!("skipping known game {}", candidate.source_url);
                summary.skipped += 1;
                continue;
            }

            if candidate.added_at.is_none() {
                candidate.added_at = Some(now);
            }
            collection.push(candidate);
            summary.added += 1;
        }

        summary.total = collection.len();
        info!(
            added = summary.added,
            skipped = summary.skipped,
            rejected = summary.rejected,
            truncated = summary.truncated,
            total = summary.total,
            "merged scrape batch"
        );
        summary
    }
}

/// Check the fields a candidate needs before it may enter the collection.
pub fn validate(candidate: &GameRecord) -> Result<(), ExtractError> {
    if candidate.playable_embed().is_none() {
        return Err(ExtractError::MissingField("embed_url"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn candidate(n: usize) -> GameRecord {
        let url = format!("https://www.onlinegames.io/game-{n}/");
        let mut record = GameRecord::new(&url, format!("Game {n}"));
        record.embed_url = Some(format!("https://cloud.onlinegames.io/game-{n}/index.html"));
        record
    }

    fn keys(collection: &Collection) -> Vec<String> {
        collection
            .games()
            .iter()
            .map(|g| g.identity_key().unwrap().to_string())
            .collect()
    }

    #[test]
    fn empty_collection_takes_all_distinct() {
        let mut collection = Collection::new();
        let summary = Merger::default().merge(&mut collection, (0..3).map(candidate));
        assert_eq!(summary.added, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.total, 3);
    }

    #[test]
    fn existing_key_is_skipped() {
        let mut collection = Collection::new();
        Merger::default().merge(&mut collection, vec![candidate(1), candidate(2)]);
        let before = collection.len();

        // Same page, different casing of the host and a trailing slash.
        let mut again = candidate(1);
        again.source_url = "https://WWW.onlinegames.io/game-1".to_string();
        again.title = "Renamed".to_string();

        let summary = Merger::default().merge(&mut collection, vec![again, candidate(3)]);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total, before + 1);
        assert_eq!(collection.games()[0].title, "Game 1");
    }

    #[test]
    fn first_occurrence_wins_within_batch() {
        let mut batch: Vec<_> = (0..95).map(candidate).collect();
        for n in [3, 10, 20, 40, 90] {
            let mut dup = candidate(n);
            dup.title = format!("Duplicate {n}");
            batch.push(dup);
        }
        assert_eq!(batch.len(), 100);

        let mut collection = Collection::new();
        let summary = Merger::new(100).merge(&mut collection, batch);
        assert_eq!(summary.added, 95);
        assert_eq!(summary.skipped, 5);
        assert_eq!(summary.truncated, 0);
        assert!(collection
            .games()
            .iter()
            .all(|g| !g.title.starts_with("Duplicate")));
    }

    #[test]
    fn malformed_candidates_are_rejected_not_skipped() {
        let mut missing = candidate(7);
        missing.embed_url = None;
        let mut relative = candidate(8);
        relative.embed_url = Some("/games/8".to_string());

        let mut collection = Collection::new();
        let batch = vec![candidate(1), missing, relative, candidate(1)];
        let batch_len = batch.len();
        let summary = Merger::default().merge(&mut collection, batch);

        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.added + summary.skipped, batch_len - summary.rejected);
        assert_eq!(summary.total, 1);
    }

    #[test]
    fn rerun_is_idempotent_and_order_stable() {
        let mut collection = Collection::new();
        let batch: Vec<_> = (0..10).map(candidate).collect();
        Merger::default().merge(&mut collection, batch.clone());
        let first = keys(&collection);

        let summary = Merger::default().merge(&mut collection, batch.into_iter().rev());
        assert_eq!(summary.added, 0);
        assert_eq!(summary.skipped, 10);
        assert_eq!(keys(&collection), first);

        let unique: HashSet<_> = first.iter().collect();
        assert_eq!(unique.len(), first.len());
    }

    #[test]
    fn existing_order_is_preserved_after_merge() {
        let mut collection = Collection::new();
        Merger::default().merge(&mut collection, vec![candidate(5), candidate(2), candidate(9)]);
        let before = keys(&collection);

        let summary =
            Merger::default().merge(&mut collection, vec![candidate(1), candidate(2), candidate(0)]);
        assert_eq!(collection.len(), before.len() + summary.added);
        assert_eq!(&keys(&collection)[..before.len()], &before[..]);
    }

    #[test]
    fn batch_limit_truncates_overflow() {
        let mut collection = Collection::new();
        let summary = Merger::new(4).merge(&mut collection, (0..6).map(candidate));
        assert_eq!(summary.added, 4);
        assert_eq!(summary.truncated, 2);
        assert_eq!(summary.total, 4);
    }

    #[test]
    fn added_at_is_stamped_once() {
        let first = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        let mut collection = Collection::new();
        Merger::default()
            .with_timestamp(first)
            .merge(&mut collection, vec![candidate(1)]);
        Merger::default()
            .with_timestamp(later)
            .merge(&mut collection, vec![candidate(1), candidate(2)]);

        assert_eq!(collection.games()[0].added_at, Some(first));
        assert_eq!(collection.games()[1].added_at, Some(later));
    }
}
