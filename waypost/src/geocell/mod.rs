//! Cell indexing module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and fixed-precision geohash cell keys used to index facilities and
//! discovery ledger entries, plus the bounding-box and distance math the
//! discovery path needs.
//!
//! All functions are pure; the only failure modes are out-of-range inputs.

mod types;

pub use types::{
    BoundingBox, CellBounds, CellError, EARTH_RADIUS_MILES, MAX_LAT, MAX_LON, MAX_PRECISION,
    MIN_LAT, MIN_LON, MIN_PRECISION,
};

/// Base-32 alphabet used for cell keys (standard geohash alphabet).
const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Statute miles per degree of latitude (also per degree of longitude at
/// the equator).
const MILES_PER_DEGREE: f64 = 69.0;

fn validate(lat: f64, lon: f64) -> Result<(), CellError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) || !lat.is_finite() {
        return Err(CellError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) || !lon.is_finite() {
        return Err(CellError::InvalidLongitude(lon));
    }
    Ok(())
}

/// Encodes geographic coordinates to a cell key.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-90 to 90)
/// * `lon` - Longitude in degrees (-180 to 180)
/// * `precision` - Key length in characters (1 to 12); precision 6 yields
///   cells of roughly 0.6 km × 1.2 km
///
/// # Returns
///
/// A `Result` containing the cell key or an error if inputs are invalid.
#[inline]
pub fn encode(lat: f64, lon: f64, precision: usize) -> Result<String, CellError> {
    validate(lat, lon)?;
    if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
        return Err(CellError::InvalidPrecision(precision));
    }

    let mut lat_range = (MIN_LAT, MAX_LAT);
    let mut lon_range = (MIN_LON, MAX_LON);
    let mut key = String::with_capacity(precision);
    let mut bits = 0u8;
    let mut ch = 0usize;
    // Bit order alternates starting with longitude
    let mut even = true;

    while key.len() < precision {
        if even {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                ch = (ch << 1) | 1;
                lon_range.0 = mid;
            } else {
                ch <<= 1;
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                ch = (ch << 1) | 1;
                lat_range.0 = mid;
            } else {
                ch <<= 1;
                lat_range.1 = mid;
            }
        }
        even = !even;
        bits += 1;
        if bits == 5 {
            key.push(BASE32[ch] as char);
            bits = 0;
            ch = 0;
        }
    }

    Ok(key)
}

/// Decodes a cell key to the geographic extent it covers.
#[inline]
pub fn decode_bounds(cell_key: &str) -> Result<CellBounds, CellError> {
    if cell_key.is_empty() || cell_key.len() > MAX_PRECISION {
        return Err(CellError::InvalidCellKey(cell_key.to_string()));
    }

    let mut lat_range = (MIN_LAT, MAX_LAT);
    let mut lon_range = (MIN_LON, MAX_LON);
    let mut even = true;

    for c in cell_key.bytes() {
        let idx = BASE32
            .iter()
            .position(|&b| b == c)
            .ok_or_else(|| CellError::InvalidCellKey(cell_key.to_string()))?;
        for shift in (0..5).rev() {
            let bit = (idx >> shift) & 1;
            if even {
                let mid = (lon_range.0 + lon_range.1) / 2.0;
                if bit == 1 {
                    lon_range.0 = mid;
                } else {
                    lon_range.1 = mid;
                }
            } else {
                let mid = (lat_range.0 + lat_range.1) / 2.0;
                if bit == 1 {
                    lat_range.0 = mid;
                } else {
                    lat_range.1 = mid;
                }
            }
            even = !even;
        }
    }

    Ok(CellBounds {
        lat_min: lat_range.0,
        lat_max: lat_range.1,
        lon_min: lon_range.0,
        lon_max: lon_range.1,
    })
}

/// Decodes a cell key to its representative center point.
///
/// Returns (latitude, longitude) of the cell center.
#[inline]
pub fn decode(cell_key: &str) -> Result<(f64, f64), CellError> {
    Ok(decode_bounds(cell_key)?.center())
}

/// Returns the distinct cells surrounding the given cell.
///
/// Neighbors are derived by re-encoding the cell center offset by one
/// cell span in each direction. Interior cells always yield eight
/// neighbors; cells bordering a pole yield fewer because the off-pole
/// rows do not exist. Longitude wraps across the antimeridian.
pub fn neighbors(cell_key: &str) -> Result<Vec<String>, CellError> {
    let bounds = decode_bounds(cell_key)?;
    let (lat, lon) = bounds.center();
    let lat_step = bounds.lat_span();
    let lon_step = bounds.lon_span();
    let precision = cell_key.len();

    let mut result = Vec::with_capacity(8);
    for lat_offset in [-1.0, 0.0, 1.0] {
        for lon_offset in [-1.0, 0.0, 1.0] {
            if lat_offset == 0.0 && lon_offset == 0.0 {
                continue;
            }
            let neighbor_lat = lat + lat_offset * lat_step;
            if !(MIN_LAT..=MAX_LAT).contains(&neighbor_lat) {
                // Off the pole; no cell exists there
                continue;
            }
            let neighbor_lon = wrap_longitude(lon + lon_offset * lon_step);
            let key = encode(neighbor_lat, neighbor_lon, precision)?;
            if key != cell_key && !result.contains(&key) {
                result.push(key);
            }
        }
    }

    Ok(result)
}

/// Computes the degree-space bounding box covering `radius_miles` around
/// a center point.
///
/// Uses the flat-earth approximation of one degree of latitude per 69
/// miles, widening the longitude span by the latitude cosine. Latitude
/// edges are clamped at the poles; longitude edges wrap across the
/// antimeridian.
#[inline]
pub fn bounding_box(lat: f64, lon: f64, radius_miles: f64) -> Result<BoundingBox, CellError> {
    validate(lat, lon)?;

    let lat_delta = radius_miles / MILES_PER_DEGREE;
    // cos(lat) shrinks toward the poles; floor it to keep the box finite
    let lon_scale = lat.to_radians().cos().max(0.01);
    let lon_delta = radius_miles / (MILES_PER_DEGREE * lon_scale);

    Ok(BoundingBox {
        south: (lat - lat_delta).max(MIN_LAT),
        west: wrap_longitude(lon - lon_delta),
        north: (lat + lat_delta).min(MAX_LAT),
        east: wrap_longitude(lon + lon_delta),
    })
}

/// Great-circle distance between two coordinates in statute miles.
///
/// Haversine formula over a mean Earth radius of 3959 miles.
#[inline]
pub fn distance_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);

    EARTH_RADIUS_MILES * 2.0 * a.sqrt().asin()
}

fn wrap_longitude(lon: f64) -> f64 {
    if (MIN_LON..=MAX_LON).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}
