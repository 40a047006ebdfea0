//! In-memory store backends.
//!
//! Reference implementations of [`FacilityStore`] and [`DiscoveryLedger`]
//! backed by `DashMap`. Suitable for tests, the CLI, and single-process
//! deployments; a database-backed implementation would replace these
//! behind the same traits.
//!
//! # Concurrency
//!
//! All mutation goes through `DashMap` entries, so the external-id
//! check-then-insert and the ledger `query_count` increment are atomic
//! under the entry's shard lock. No lock is held across an await point.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::facility::{CandidateFacility, DataSource, Facility};
use crate::geocell;

use super::traits::{BoxFuture, DiscoveryLedger, DiscoveryRecord, FacilityStore, StoreError};

/// In-memory facility store indexed by cell key and external id.
pub struct MemoryFacilityStore {
    precision: usize,
    /// Facility id → facility.
    facilities: DashMap<String, Facility>,
    /// Cell key → facility ids in that cell.
    by_cell: DashMap<String, Vec<String>>,
    /// External id → facility id.
    by_external: DashMap<String, String>,
}

impl MemoryFacilityStore {
    /// Creates an empty store indexing at the given cell precision.
    pub fn new(precision: usize) -> Self {
        Self {
            precision,
            facilities: DashMap::new(),
            by_cell: DashMap::new(),
            by_external: DashMap::new(),
        }
    }

    /// Number of facilities currently stored.
    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    /// Whether the store holds no facilities.
    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }

    fn build_facility(
        &self,
        candidate: CandidateFacility,
        source: DataSource,
    ) -> Result<Facility, StoreError> {
        let cell_key = geocell::encode(candidate.latitude, candidate.longitude, self.precision)?;
        let now = Utc::now();
        Ok(Facility {
            id: Uuid::new_v4().to_string(),
            name: candidate.name,
            category: candidate.category,
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            cell_key,
            external_id: candidate.external_id,
            external_version: candidate.external_version,
            source,
            last_verified_at: now,
            created_at: now,
        })
    }

    fn store_row(&self, facility: Facility) {
        self.by_cell
            .entry(facility.cell_key.clone())
            .or_default()
            .push(facility.id.clone());
        self.facilities.insert(facility.id.clone(), facility);
    }

    fn refresh_row(&self, id: &str, external_version: Option<i64>) {
        if let Some(mut facility) = self.facilities.get_mut(id) {
            facility.last_verified_at = Utc::now();
            if let Some(version) = external_version {
                if facility.external_version.map_or(true, |v| version > v) {
                    facility.external_version = Some(version);
                }
            }
        }
    }
}

impl FacilityStore for MemoryFacilityStore {
    fn lookup_precision(&self) -> usize {
        self.precision
    }

    fn in_cells(&self, cells: &[String]) -> BoxFuture<'_, Result<Vec<Facility>, StoreError>> {
        let cells = cells.to_vec();
        Box::pin(async move {
            let mut result = Vec::new();
            for cell in &cells {
                if let Some(ids) = self.by_cell.get(cell) {
                    for id in ids.iter() {
                        if let Some(facility) = self.facilities.get(id) {
                            result.push(facility.clone());
                        }
                    }
                }
            }
            Ok(result)
        })
    }

    fn insert(
        &self,
        candidate: CandidateFacility,
        source: DataSource,
    ) -> BoxFuture<'_, Result<Facility, StoreError>> {
        Box::pin(async move {
            match candidate.external_id.clone() {
                Some(external_id) => {
                    // Entry holds the shard lock, making the external-id
                    // check-then-insert atomic against concurrent
                    // discoveries of the same element.
                    match self.by_external.entry(external_id) {
                        Entry::Occupied(existing) => {
                            let id = existing.get().clone();
                            drop(existing);
                            self.refresh_row(&id, candidate.external_version);
                            let facility = self.facilities.get(&id).map(|f| f.clone());
                            facility.ok_or_else(|| {
                                StoreError::Backend(format!(
                                    "external id index references missing facility {}",
                                    id
                                ))
                            })
                        }
                        Entry::Vacant(slot) => {
                            // Store the row before releasing the entry
                            // lock so losers of the race always find it
                            let facility = self.build_facility(candidate, source)?;
                            self.store_row(facility.clone());
                            slot.insert(facility.id.clone());
                            Ok(facility)
                        }
                    }
                }
                None => {
                    let facility = self.build_facility(candidate, source)?;
                    self.store_row(facility.clone());
                    Ok(facility)
                }
            }
        })
    }

    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> BoxFuture<'_, Result<Option<Facility>, StoreError>> {
        let external_id = external_id.to_string();
        Box::pin(async move {
            let id = match self.by_external.get(&external_id) {
                Some(id) => id.clone(),
                None => return Ok(None),
            };
            Ok(self.facilities.get(&id).map(|f| f.clone()))
        })
    }

    fn refresh_verification(
        &self,
        id: &str,
        external_version: Option<i64>,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let id = id.to_string();
        Box::pin(async move {
            self.refresh_row(&id, external_version);
            Ok(())
        })
    }
}

/// In-memory discovery ledger.
pub struct MemoryDiscoveryLedger {
    records: DashMap<String, DiscoveryRecord>,
}

impl MemoryDiscoveryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Number of cells with at least one recorded query.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether any cell has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryDiscoveryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryLedger for MemoryDiscoveryLedger {
    fn get(&self, cell_key: &str) -> BoxFuture<'_, Result<Option<DiscoveryRecord>, StoreError>> {
        let cell_key = cell_key.to_string();
        Box::pin(async move { Ok(self.records.get(&cell_key).map(|r| r.clone())) })
    }

    fn record(
        &self,
        cell_key: &str,
        center: (f64, f64),
        radius_miles: f64,
        facilities_found: u32,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let cell_key = cell_key.to_string();
        Box::pin(async move {
            match self.records.entry(cell_key.clone()) {
                Entry::Occupied(mut existing) => {
                    // Update in place; the entry lock makes the
                    // query_count increment atomic
                    let record = existing.get_mut();
                    record.facilities_found = facilities_found;
                    record.last_queried_at = Utc::now();
                    record.query_count += 1;
                }
                Entry::Vacant(slot) => {
                    slot.insert(DiscoveryRecord {
                        cell_key,
                        center_lat: center.0,
                        center_lon: center.1,
                        radius_miles,
                        facilities_found,
                        last_queried_at: Utc::now(),
                        query_count: 1,
                    });
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::FacilityCategory;
    use std::time::Duration;

    fn candidate(name: &str, lat: f64, lon: f64, external_id: Option<&str>) -> CandidateFacility {
        CandidateFacility {
            name: name.to_string(),
            category: FacilityCategory::TruckStop,
            latitude: lat,
            longitude: lon,
            external_id: external_id.map(String::from),
            external_version: Some(1),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_identity_and_cell_key() {
        let store = MemoryFacilityStore::new(6);
        let facility = store
            .insert(
                candidate("Love's Travel Stop", 36.7780, -119.4175, Some("node/1")),
                DataSource::External,
            )
            .await
            .unwrap();

        assert!(!facility.id.is_empty());
        assert_eq!(
            facility.cell_key,
            geocell::encode(36.7780, -119.4175, 6).unwrap()
        );
        assert_eq!(facility.source, DataSource::External);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_same_external_id_never_duplicates() {
        let store = MemoryFacilityStore::new(6);
        let first = store
            .insert(
                candidate("Love's Travel Stop", 36.7780, -119.4175, Some("node/1")),
                DataSource::External,
            )
            .await
            .unwrap();
        let second = store
            .insert(
                candidate("Love's Travel Stop", 36.7780, -119.4175, Some("node/1")),
                DataSource::External,
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_duplicate_external_id_refreshes_version() {
        let store = MemoryFacilityStore::new(6);
        let first = store
            .insert(
                candidate("Love's Travel Stop", 36.7780, -119.4175, Some("node/1")),
                DataSource::External,
            )
            .await
            .unwrap();

        let mut newer = candidate("Love's Travel Stop", 36.7780, -119.4175, Some("node/1"));
        newer.external_version = Some(7);
        let second = store.insert(newer, DataSource::External).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.external_version, Some(7));
        assert!(second.last_verified_at >= first.last_verified_at);
    }

    #[tokio::test]
    async fn test_find_by_external_id() {
        let store = MemoryFacilityStore::new(6);
        store
            .insert(
                candidate("Petro Fresno", 36.7, -119.4, Some("way/42")),
                DataSource::External,
            )
            .await
            .unwrap();

        let found = store.find_by_external_id("way/42").await.unwrap();
        assert_eq!(found.unwrap().name, "Petro Fresno");
        assert!(store.find_by_external_id("way/43").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nearest_within_threshold() {
        let store = MemoryFacilityStore::new(6);
        store
            .insert(
                candidate("Love's Travel Stop", 36.7780, -119.4175, Some("node/1")),
                DataSource::External,
            )
            .await
            .unwrap();

        let found = store.nearest(36.7783, -119.4179, 0.3).await.unwrap();
        assert_eq!(found.unwrap().name, "Love's Travel Stop");
    }

    #[tokio::test]
    async fn test_nearest_threshold_is_inclusive() {
        let store = MemoryFacilityStore::new(6);
        store
            .insert(
                candidate("Boundary Stop", 36.7780, -119.4175, None),
                DataSource::Manual,
            )
            .await
            .unwrap();

        let exact = geocell::distance_miles(36.7783, -119.4179, 36.7780, -119.4175);

        // At exactly the facility distance the facility is included
        let hit = store.nearest(36.7783, -119.4179, exact).await.unwrap();
        assert!(hit.is_some());

        // Any tighter threshold excludes it
        let miss = store
            .nearest(36.7783, -119.4179, exact * 0.999)
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_nearest_finds_facility_across_cell_boundary() {
        let store = MemoryFacilityStore::new(6);

        // Pick a query point close to its cell's eastern edge and place
        // the facility just inside the neighboring cell
        let cell = geocell::encode(36.7783, -119.4179, 6).unwrap();
        let bounds = geocell::decode_bounds(&cell).unwrap();
        let query_lon = bounds.lon_max - 0.0001;
        let facility_lon = bounds.lon_max + 0.0001;
        let lat = bounds.center().0;

        let inserted = store
            .insert(
                candidate("Edge Stop", lat, facility_lon, None),
                DataSource::Manual,
            )
            .await
            .unwrap();
        assert_ne!(inserted.cell_key, cell, "facility must land in a neighbor");

        let found = store.nearest(lat, query_lon, 0.3).await.unwrap();
        assert_eq!(found.unwrap().name, "Edge Stop");
    }

    #[tokio::test]
    async fn test_nearest_prefers_strictly_closer() {
        let store = MemoryFacilityStore::new(6);
        store
            .insert(
                candidate("Far Stop", 36.7800, -119.4175, None),
                DataSource::Manual,
            )
            .await
            .unwrap();
        store
            .insert(
                candidate("Near Stop", 36.7784, -119.4179, None),
                DataSource::Manual,
            )
            .await
            .unwrap();

        let found = store.nearest(36.7783, -119.4179, 0.3).await.unwrap();
        assert_eq!(found.unwrap().name, "Near Stop");
    }

    #[tokio::test]
    async fn test_nearest_tie_breaks_on_lowest_id() {
        let store = MemoryFacilityStore::new(6);

        // Same latitude, symmetric longitude offsets that are exact in
        // binary (2^-10 degrees), so the two distances are bit-identical
        let offset = 0.0009765625;
        let a = store
            .insert(
                candidate("East Stop", 36.0, -119.0 + offset, None),
                DataSource::Manual,
            )
            .await
            .unwrap();
        let b = store
            .insert(
                candidate("West Stop", 36.0, -119.0 - offset, None),
                DataSource::Manual,
            )
            .await
            .unwrap();

        let da = geocell::distance_miles(36.0, -119.0, a.latitude, a.longitude);
        let db = geocell::distance_miles(36.0, -119.0, b.latitude, b.longitude);
        assert_eq!(da, db, "offsets chosen to tie exactly");

        let expected = if a.id < b.id { a.clone() } else { b.clone() };
        let found = store.nearest(36.0, -119.0, 0.3).await.unwrap();
        assert_eq!(found.unwrap().id, expected.id);
    }

    #[tokio::test]
    async fn test_nearest_empty_store_returns_none() {
        let store = MemoryFacilityStore::new(6);
        assert!(store.nearest(36.0, -119.0, 0.3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ledger_first_record() {
        let ledger = MemoryDiscoveryLedger::new();
        ledger
            .record("9q8yyk", (37.7749, -122.4194), 5.0, 3)
            .await
            .unwrap();

        let record = ledger.get("9q8yyk").await.unwrap().unwrap();
        assert_eq!(record.facilities_found, 3);
        assert_eq!(record.query_count, 1);
        assert_eq!(record.radius_miles, 5.0);
    }

    #[tokio::test]
    async fn test_ledger_update_in_place_increments_count() {
        let ledger = MemoryDiscoveryLedger::new();
        ledger
            .record("9q8yyk", (37.7749, -122.4194), 5.0, 3)
            .await
            .unwrap();
        ledger
            .record("9q8yyk", (37.7749, -122.4194), 5.0, 0)
            .await
            .unwrap();

        let record = ledger.get("9q8yyk").await.unwrap().unwrap();
        assert_eq!(record.facilities_found, 0);
        assert_eq!(record.query_count, 2);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_zero_result_still_recorded() {
        let ledger = MemoryDiscoveryLedger::new();
        ledger.record("9q8yyk", (37.0, -122.0), 5.0, 0).await.unwrap();

        let record = ledger.get("9q8yyk").await.unwrap().unwrap();
        assert_eq!(record.facilities_found, 0);
        assert_eq!(record.query_count, 1);
    }

    #[tokio::test]
    async fn test_should_query_unknown_cell() {
        let ledger = MemoryDiscoveryLedger::new();
        assert!(ledger
            .should_query("9q8yyk", Duration::from_secs(3600))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_should_query_fresh_record_suppressed() {
        let ledger = MemoryDiscoveryLedger::new();
        ledger.record("9q8yyk", (37.0, -122.0), 5.0, 0).await.unwrap();

        assert!(!ledger
            .should_query("9q8yyk", Duration::from_secs(3600))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_should_query_stale_record() {
        let ledger = MemoryDiscoveryLedger::new();
        ledger.record("9q8yyk", (37.0, -122.0), 5.0, 2).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(ledger
            .should_query("9q8yyk", Duration::from_millis(10))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_same_external_id() {
        use std::sync::Arc;

        let store = Arc::new(MemoryFacilityStore::new(6));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .insert(
                        candidate("Love's Travel Stop", 36.7780, -119.4175, Some("node/1")),
                        DataSource::External,
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().id);
        }
        assert_eq!(store.len(), 1, "racing inserts must collapse to one row");
        assert!(ids.iter().all(|id| id == &ids[0]));
    }
}
