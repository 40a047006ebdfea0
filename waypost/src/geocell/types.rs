//! Types for the geocell module.

use std::fmt;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Minimum cell key precision (characters).
pub const MIN_PRECISION: usize = 1;

/// Maximum cell key precision (characters).
///
/// Twelve characters resolve to well under a metre, which is finer than
/// any consumer of cell keys needs.
pub const MAX_PRECISION: usize = 12;

/// Mean Earth radius in miles, used for great-circle distance.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Errors that can occur during cell key operations.
#[derive(Debug, Clone, PartialEq)]
pub enum CellError {
    /// Latitude outside [-90, 90].
    InvalidLatitude(f64),
    /// Longitude outside [-180, 180].
    InvalidLongitude(f64),
    /// Precision outside [1, 12].
    InvalidPrecision(usize),
    /// Cell key is empty, too long, or contains non-base32 characters.
    InvalidCellKey(String),
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellError::InvalidLatitude(lat) => {
                write!(f, "Invalid latitude: {} (must be -90 to 90)", lat)
            }
            CellError::InvalidLongitude(lon) => {
                write!(f, "Invalid longitude: {} (must be -180 to 180)", lon)
            }
            CellError::InvalidPrecision(p) => {
                write!(
                    f,
                    "Invalid precision: {} (must be {} to {})",
                    p, MIN_PRECISION, MAX_PRECISION
                )
            }
            CellError::InvalidCellKey(key) => write!(f, "Invalid cell key: {:?}", key),
        }
    }
}

impl std::error::Error for CellError {}

/// Geographic extent of a single cell.
///
/// Produced by [`decode_bounds`](crate::geocell::decode_bounds); spans
/// shrink as key precision grows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    /// Southern edge latitude.
    pub lat_min: f64,
    /// Northern edge latitude.
    pub lat_max: f64,
    /// Western edge longitude.
    pub lon_min: f64,
    /// Eastern edge longitude.
    pub lon_max: f64,
}

impl CellBounds {
    /// Center point of the cell as (latitude, longitude).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.lat_min + self.lat_max) / 2.0,
            (self.lon_min + self.lon_max) / 2.0,
        )
    }

    /// Latitude span of the cell in degrees.
    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Longitude span of the cell in degrees.
    pub fn lon_span(&self) -> f64 {
        self.lon_max - self.lon_min
    }
}

/// Degree-space bounding box for an external discovery query.
///
/// Built from a center point and a radius in miles. Latitude edges are
/// clamped at the poles (south ≤ north always holds); longitude edges
/// wrap across the antimeridian, so a box straddling it carries
/// `west > east`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southern edge latitude.
    pub south: f64,
    /// Western edge longitude.
    pub west: f64,
    /// Northern edge latitude.
    pub north: f64,
    /// Eastern edge longitude.
    pub east: f64,
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.4},{:.4},{:.4},{:.4})",
            self.south, self.west, self.north, self.east
        )
    }
}
