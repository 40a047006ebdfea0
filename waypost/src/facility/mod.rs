//! Facility domain types.
//!
//! Defines the persisted [`Facility`] record, the pre-insert
//! [`CandidateFacility`] produced by discovery providers, and the
//! [`FacilityMatch`] returned to resolution callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a truck-relevant facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityCategory {
    /// Fuel stop serving heavy-goods vehicles.
    TruckStop,
    /// Highway rest area.
    RestArea,
    /// Highway service area / service plaza.
    ServiceArea,
    /// Anything else the provider returned that matched the filters.
    Other,
}

impl FacilityCategory {
    /// Human-readable label, used for fallback facility names.
    pub fn label(&self) -> &'static str {
        match self {
            FacilityCategory::TruckStop => "Truck Stop",
            FacilityCategory::RestArea => "Rest Area",
            FacilityCategory::ServiceArea => "Service Area",
            FacilityCategory::Other => "Facility",
        }
    }
}

impl fmt::Display for FacilityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacilityCategory::TruckStop => write!(f, "truck_stop"),
            FacilityCategory::RestArea => write!(f, "rest_area"),
            FacilityCategory::ServiceArea => write!(f, "service_area"),
            FacilityCategory::Other => write!(f, "other"),
        }
    }
}

/// Where a facility record originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Imported from the external geodata provider.
    External,
    /// Entered by an operator.
    Manual,
    /// Submitted by an end user.
    UserSubmitted,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::External => write!(f, "external"),
            DataSource::Manual => write!(f, "manual"),
            DataSource::UserSubmitted => write!(f, "user_submitted"),
        }
    }
}

/// A persisted facility record.
///
/// The `cell_key` is always recomputed from (latitude, longitude) at the
/// store's canonical lookup precision when the row is written; callers
/// never supply it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    /// Store-assigned identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Facility category.
    pub category: FacilityCategory,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Cell key at the canonical lookup precision, derived from the
    /// coordinates above.
    pub cell_key: String,
    /// External-source element reference (e.g. `node/123`), if imported.
    pub external_id: Option<String>,
    /// External-source element version, if the provider supplied one.
    pub external_version: Option<i64>,
    /// Origin of the record.
    pub source: DataSource,
    /// When the facility was last confirmed against its source.
    pub last_verified_at: DateTime<Utc>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// A normalized provider element that has not yet been persisted.
///
/// Produced by the discovery client; runs through deduplication before
/// it may become a [`Facility`].
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFacility {
    /// Display name.
    pub name: String,
    /// Facility category.
    pub category: FacilityCategory,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// External-source element reference.
    pub external_id: Option<String>,
    /// External-source element version.
    pub external_version: Option<i64>,
}

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityMatch {
    /// Identifier of the matched facility.
    pub facility_id: String,
    /// Display name of the matched facility.
    pub name: String,
    /// Great-circle distance from the queried coordinate in miles.
    pub distance_miles: f64,
}
