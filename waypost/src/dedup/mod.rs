//! Candidate facility deduplication.
//!
//! Decides whether a discovered candidate is already known before it is
//! inserted. Matching runs in two stages:
//!
//! 1. exact match on the external-source identifier
//! 2. proximity match: within a small fixed distance of an existing
//!    facility **and** name similarity above a fixed threshold
//!
//! Provider naming is inconsistent ("Love's" vs "Love's Travel Stop
//! #214"), so stage 2 uses a pluggable, thresholded similarity function
//! rather than exact equality or ad hoc substring containment.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::facility::{CandidateFacility, Facility};
use crate::geocell;
use crate::store::{FacilityStore, StoreError};

/// Default minimum similarity score for a proximity match.
pub const DEFAULT_NAME_SIMILARITY_THRESHOLD: f64 = 0.5;

/// Scores how likely two facility names refer to the same place.
pub trait NameSimilarity: Send + Sync {
    /// Returns a score in `[0, 1]`; 1.0 means certainly the same name.
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Token-overlap similarity.
///
/// Names are lowercased, stripped of punctuation, and split into
/// tokens; the score is the shared-token count divided by the smaller
/// token set's size. Containment therefore scores 1.0, which covers the
/// common case of one source carrying a longer variant of the same name.
pub struct TokenSimilarity {
    strip: Regex,
}

impl TokenSimilarity {
    /// Creates the default scorer.
    pub fn new() -> Self {
        Self {
            strip: Regex::new(r"[^a-z0-9]+").expect("static pattern compiles"),
        }
    }

    fn tokens(&self, name: &str) -> HashSet<String> {
        // Drop apostrophes before splitting so "Love's" and "Loves"
        // produce the same token
        let normalized = name.to_lowercase().replace('\'', "");
        self.strip
            .split(&normalized)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }
}

impl Default for TokenSimilarity {
    fn default() -> Self {
        Self::new()
    }
}

impl NameSimilarity for TokenSimilarity {
    fn score(&self, a: &str, b: &str) -> f64 {
        let tokens_a = self.tokens(a);
        let tokens_b = self.tokens(b);
        let smaller = tokens_a.len().min(tokens_b.len());
        if smaller == 0 {
            return 0.0;
        }
        let shared = tokens_a.intersection(&tokens_b).count();
        shared as f64 / smaller as f64
    }
}

/// Decides whether a candidate facility is already known.
#[derive(Clone)]
pub struct Deduplicator {
    proximity_miles: f64,
    threshold: f64,
    similarity: Arc<dyn NameSimilarity>,
}

impl Deduplicator {
    /// Creates a deduplicator with the default token-overlap scorer.
    pub fn new(proximity_miles: f64) -> Self {
        Self::with_similarity(
            proximity_miles,
            DEFAULT_NAME_SIMILARITY_THRESHOLD,
            Arc::new(TokenSimilarity::new()),
        )
    }

    /// Creates a deduplicator with a custom similarity function and
    /// threshold.
    pub fn with_similarity(
        proximity_miles: f64,
        threshold: f64,
        similarity: Arc<dyn NameSimilarity>,
    ) -> Self {
        Self {
            proximity_miles,
            threshold,
            similarity,
        }
    }

    /// Returns the already-known facility this candidate duplicates, if
    /// any.
    ///
    /// The caller refreshes the returned facility's verification state;
    /// this method only decides identity.
    pub async fn find_existing(
        &self,
        candidate: &CandidateFacility,
        store: &dyn FacilityStore,
    ) -> Result<Option<Facility>, StoreError> {
        // Stage 1: external identifier
        if let Some(external_id) = &candidate.external_id {
            if let Some(existing) = store.find_by_external_id(external_id).await? {
                debug!(external_id = %external_id, "Duplicate by external id");
                return Ok(Some(existing));
            }
        }

        // Stage 2: proximity + name similarity over the candidate's
        // cell and its neighbors
        let cell = geocell::encode(
            candidate.latitude,
            candidate.longitude,
            store.lookup_precision(),
        )?;
        let mut cells = geocell::neighbors(&cell)?;
        cells.push(cell);

        for existing in store.in_cells(&cells).await? {
            let distance = geocell::distance_miles(
                candidate.latitude,
                candidate.longitude,
                existing.latitude,
                existing.longitude,
            );
            if distance > self.proximity_miles {
                continue;
            }
            let score = self.similarity.score(&candidate.name, &existing.name);
            if score >= self.threshold {
                debug!(
                    candidate = %candidate.name,
                    existing = %existing.name,
                    distance_miles = distance,
                    score,
                    "Duplicate by proximity"
                );
                return Ok(Some(existing));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::{DataSource, FacilityCategory};
    use crate::store::MemoryFacilityStore;

    fn candidate(name: &str, lat: f64, lon: f64, external_id: Option<&str>) -> CandidateFacility {
        CandidateFacility {
            name: name.to_string(),
            category: FacilityCategory::TruckStop,
            latitude: lat,
            longitude: lon,
            external_id: external_id.map(String::from),
            external_version: None,
        }
    }

    #[test]
    fn test_token_similarity_identical() {
        let sim = TokenSimilarity::new();
        assert_eq!(sim.score("Love's Travel Stop", "Love's Travel Stop"), 1.0);
    }

    #[test]
    fn test_token_similarity_containment_scores_full() {
        let sim = TokenSimilarity::new();
        assert_eq!(sim.score("Love's", "Love's Travel Stop"), 1.0);
        assert_eq!(sim.score("Pilot Travel Center #214", "Pilot"), 1.0);
    }

    #[test]
    fn test_token_similarity_unrelated_names() {
        let sim = TokenSimilarity::new();
        assert_eq!(sim.score("Petro Fresno", "Flying J"), 0.0);
    }

    #[test]
    fn test_token_similarity_partial_overlap() {
        let sim = TokenSimilarity::new();
        // {pilot, travel, center} vs {loves, travel, stop}: 1 of 3
        let score = sim.score("Pilot Travel Center", "Love's Travel Stop");
        assert!(score > 0.3 && score < 0.4, "got {}", score);
    }

    #[test]
    fn test_token_similarity_punctuation_ignored() {
        let sim = TokenSimilarity::new();
        assert_eq!(sim.score("Love's Travel-Stop", "loves travel stop"), 1.0);
    }

    #[test]
    fn test_token_similarity_empty_name() {
        let sim = TokenSimilarity::new();
        assert_eq!(sim.score("", "Love's"), 0.0);
        assert_eq!(sim.score("---", "Love's"), 0.0);
    }

    #[tokio::test]
    async fn test_find_existing_by_external_id() {
        let store = MemoryFacilityStore::new(6);
        let inserted = store
            .insert(
                candidate("Love's Travel Stop", 36.7780, -119.4175, Some("node/1")),
                DataSource::External,
            )
            .await
            .unwrap();

        let dedup = Deduplicator::new(0.05);
        // Same external id, different coordinates: still a duplicate
        let probe = candidate("Love's", 36.9, -119.6, Some("node/1"));
        let found = dedup.find_existing(&probe, &store).await.unwrap();
        assert_eq!(found.unwrap().id, inserted.id);
    }

    #[tokio::test]
    async fn test_find_existing_by_proximity_and_name() {
        let store = MemoryFacilityStore::new(6);
        let inserted = store
            .insert(
                candidate("Love's Travel Stop", 36.7780, -119.4175, Some("node/1")),
                DataSource::External,
            )
            .await
            .unwrap();

        let dedup = Deduplicator::new(0.05);
        // ~80 feet away under a different external id and shorter name
        let probe = candidate("Love's", 36.77802, -119.41775, Some("way/9"));
        let found = dedup.find_existing(&probe, &store).await.unwrap();
        assert_eq!(found.unwrap().id, inserted.id);
    }

    #[tokio::test]
    async fn test_near_but_differently_named_is_not_duplicate() {
        let store = MemoryFacilityStore::new(6);
        store
            .insert(
                candidate("Love's Travel Stop", 36.7780, -119.4175, Some("node/1")),
                DataSource::External,
            )
            .await
            .unwrap();

        let dedup = Deduplicator::new(0.05);
        let probe = candidate("Petro Fresno", 36.77802, -119.41775, Some("way/9"));
        let found = dedup.find_existing(&probe, &store).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_same_name_beyond_proximity_is_not_duplicate() {
        let store = MemoryFacilityStore::new(6);
        store
            .insert(
                candidate("Love's Travel Stop", 36.7780, -119.4175, Some("node/1")),
                DataSource::External,
            )
            .await
            .unwrap();

        let dedup = Deduplicator::new(0.05);
        // Same chain ~350 feet up the highway is a different facility
        let probe = candidate("Love's Travel Stop", 36.7790, -119.4175, Some("way/9"));
        let found = dedup.find_existing(&probe, &store).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_across_cell_boundary() {
        let store = MemoryFacilityStore::new(6);

        // Facility just inside one cell, probe just across the edge
        let cell = geocell::encode(36.7780, -119.4175, 6).unwrap();
        let bounds = geocell::decode_bounds(&cell).unwrap();
        let lat = bounds.center().0;

        let inserted = store
            .insert(
                candidate("Love's Travel Stop", lat, bounds.lon_max - 0.0001, Some("node/1")),
                DataSource::External,
            )
            .await
            .unwrap();

        let dedup = Deduplicator::new(0.05);
        let probe = candidate("Love's", lat, bounds.lon_max + 0.0001, Some("way/9"));
        let found = dedup.find_existing(&probe, &store).await.unwrap();
        assert_eq!(found.unwrap().id, inserted.id);
    }
}
