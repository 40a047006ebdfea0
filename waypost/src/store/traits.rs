//! Core traits for facility persistence.
//!
//! [`FacilityStore`] and [`DiscoveryLedger`] define the schema-level
//! contract against the persistent store; the concrete storage
//! technology is a backend concern. Both traits are dyn-compatible
//! (`Pin<Box<dyn Future>>` methods) so resolvers receive them as
//! injected `Arc<dyn …>` values, never as ambient singletons.
//!
//! The nearest-facility and freshness algorithms live here as provided
//! methods so every backend shares one implementation:
//!
//! - `nearest` scans the query cell **and its eight neighbors** and
//!   ranks candidates by true great-circle distance. Exact-prefix
//!   matching alone misses facilities that sit just across a cell
//!   boundary.
//! - `should_query` treats a zero-result record exactly like a
//!   populated one: a confirmed-empty cell is not re-queried until the
//!   freshness window elapses.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::facility::{CandidateFacility, DataSource, Facility};
use crate::geocell::{self, CellError};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from the storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cell key derivation failed (invalid coordinates).
    #[error(transparent)]
    Cell(#[from] CellError),

    /// Backend-specific error.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Ledger entry recording one cell's discovery history.
///
/// At most one record exists per cell key; a record exists if and only
/// if the cell has been queried at least once, zero-result queries
/// included. Records are updated in place and never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryRecord {
    /// The cell this record covers.
    pub cell_key: String,
    /// Latitude of the query center.
    pub center_lat: f64,
    /// Longitude of the query center.
    pub center_lon: f64,
    /// Radius of the discovery query in miles.
    pub radius_miles: f64,
    /// Facilities the provider returned on the most recent query.
    pub facilities_found: u32,
    /// When the cell was last queried.
    pub last_queried_at: DateTime<Utc>,
    /// Total queries issued for this cell; monotonically non-decreasing.
    pub query_count: u32,
}

/// Persistent collection of known facilities.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; stores are shared across
/// resolvers and mutated concurrently. `insert` must be race-safe on
/// `external_id`: concurrent discoveries for adjacent cells can submit
/// the same physical facility, and the check-then-insert must be as
/// close to atomic as the backend allows.
pub trait FacilityStore: Send + Sync {
    /// The canonical cell key precision this store indexes at.
    fn lookup_precision(&self) -> usize;

    /// Returns every facility whose cell key is in `cells`.
    fn in_cells(&self, cells: &[String]) -> BoxFuture<'_, Result<Vec<Facility>, StoreError>>;

    /// Persists a candidate as a new facility row.
    ///
    /// The store assigns the identifier, derives the cell key from the
    /// candidate's coordinates at [`lookup_precision`](Self::lookup_precision),
    /// and stamps creation/verification times. If a row with the same
    /// `external_id` already exists (lost race with a concurrent
    /// discovery), that row is refreshed and returned instead of
    /// creating a duplicate.
    fn insert(
        &self,
        candidate: CandidateFacility,
        source: DataSource,
    ) -> BoxFuture<'_, Result<Facility, StoreError>>;

    /// Looks up a facility by its external-source reference.
    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> BoxFuture<'_, Result<Option<Facility>, StoreError>>;

    /// Marks a facility as re-verified now.
    ///
    /// Adopts `external_version` when it is newer than the stored one.
    /// Refreshing an unknown id is a no-op, not an error.
    fn refresh_verification(
        &self,
        id: &str,
        external_version: Option<i64>,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Finds the nearest facility within `threshold_miles` of a point.
    ///
    /// Scans the query cell and its eight neighbors, computes true
    /// great-circle distance to each candidate, and returns the closest
    /// one if it lies within the threshold (inclusive). Exact distance
    /// ties resolve to the lowest facility identifier so results are
    /// reproducible.
    fn nearest(
        &self,
        lat: f64,
        lon: f64,
        threshold_miles: f64,
    ) -> BoxFuture<'_, Result<Option<Facility>, StoreError>> {
        Box::pin(async move {
            let cell = geocell::encode(lat, lon, self.lookup_precision())?;
            let mut cells = geocell::neighbors(&cell)?;
            cells.push(cell);

            let mut best: Option<(Facility, f64)> = None;
            for facility in self.in_cells(&cells).await? {
                let distance =
                    geocell::distance_miles(lat, lon, facility.latitude, facility.longitude);
                if distance > threshold_miles {
                    continue;
                }
                best = match best {
                    None => Some((facility, distance)),
                    Some((current, current_distance)) => {
                        if distance < current_distance
                            || (distance == current_distance && facility.id < current.id)
                        {
                            Some((facility, distance))
                        } else {
                            Some((current, current_distance))
                        }
                    }
                };
            }

            Ok(best.map(|(facility, _)| facility))
        })
    }
}

/// Persistent record of which cells have been queried, when, and with
/// what result count.
pub trait DiscoveryLedger: Send + Sync {
    /// Returns the record for a cell, if the cell was ever queried.
    fn get(&self, cell_key: &str) -> BoxFuture<'_, Result<Option<DiscoveryRecord>, StoreError>>;

    /// Records a completed query for a cell.
    ///
    /// Creates the record with `query_count = 1` on first query, or
    /// updates it in place with an atomic increment on every subsequent
    /// one. Zero-result queries are recorded like any other.
    fn record(
        &self,
        cell_key: &str,
        center: (f64, f64),
        radius_miles: f64,
        facilities_found: u32,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Whether a cell is due for (re-)discovery.
    ///
    /// True iff no record exists or the record is older than
    /// `freshness_window`.
    fn should_query(
        &self,
        cell_key: &str,
        freshness_window: Duration,
    ) -> BoxFuture<'_, Result<bool, StoreError>> {
        let cell_key = cell_key.to_string();
        Box::pin(async move {
            match self.get(&cell_key).await? {
                None => Ok(true),
                Some(record) => {
                    let window = chrono::Duration::from_std(freshness_window)
                        .unwrap_or(chrono::Duration::MAX);
                    let age = Utc::now().signed_duration_since(record.last_queried_at);
                    Ok(age > window)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Backend("connection lost".to_string());
        assert!(err.to_string().contains("connection lost"));
    }

    #[test]
    fn test_store_error_from_cell_error() {
        let cell_err = CellError::InvalidLatitude(99.0);
        let store_err: StoreError = cell_err.into();
        assert!(matches!(store_err, StoreError::Cell(_)));
    }

    #[test]
    fn test_store_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }

    #[test]
    fn test_discovery_record_clone_roundtrip() {
        let record = DiscoveryRecord {
            cell_key: "9q8yyk".to_string(),
            center_lat: 37.7749,
            center_lon: -122.4194,
            radius_miles: 5.0,
            facilities_found: 0,
            last_queried_at: Utc::now(),
            query_count: 1,
        };
        assert_eq!(record.clone(), record);
    }
}
