//! Overpass discovery provider.
//!
//! Queries the Overpass API (OpenStreetMap) for truck-relevant
//! facilities inside a bounding box: fuel stations flagged for
//! heavy-goods vehicles, named major-chain truck stops, highway rest
//! areas, and highway service areas. Node and way elements are both
//! requested; ways come back with a computed center point.
//!
//! Outbound resource limits are enforced here, before the coordinator
//! ever sees a failure:
//! - a global concurrency ceiling (semaphore) bounds simultaneous
//!   requests against the provider
//! - a rolling daily quota short-circuits to
//!   [`ProviderError::QuotaExceeded`] without touching the network

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::facility::{CandidateFacility, FacilityCategory};
use crate::geocell::BoundingBox;
use crate::store::BoxFuture;

use super::http::HttpClient;
use super::quota::DailyQuota;
use super::types::{DiscoveryProvider, ProviderError};

/// Public Overpass API endpoint.
pub const OVERPASS_DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Major truck stop chains matched by name even without an `hgv` tag.
const CHAIN_NAME_PATTERN: &str = "(Love|Pilot|Flying J|TA|Petro)";

/// Configuration for the Overpass provider.
#[derive(Debug, Clone)]
pub struct OverpassConfig {
    /// Overpass interpreter endpoint URL.
    pub endpoint: String,
    /// Server-side query timeout; the HTTP timeout should sit slightly
    /// above this.
    pub query_timeout: Duration,
    /// Daily ceiling on outbound queries.
    pub daily_quota: u32,
    /// Maximum simultaneous outbound queries.
    pub max_concurrent: usize,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            endpoint: OVERPASS_DEFAULT_ENDPOINT.to_string(),
            query_timeout: Duration::from_secs(30),
            daily_quota: 1000,
            max_concurrent: 2,
        }
    }
}

/// Overpass API discovery provider.
pub struct OverpassProvider<C: HttpClient> {
    http: C,
    config: OverpassConfig,
    quota: DailyQuota,
    permits: Arc<Semaphore>,
}

impl<C: HttpClient> OverpassProvider<C> {
    /// Creates a provider over the given HTTP client.
    pub fn new(http: C, config: OverpassConfig) -> Self {
        let quota = DailyQuota::new(config.daily_quota);
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            http,
            config,
            quota,
            permits,
        }
    }

    /// Discovery queries remaining in today's quota.
    pub fn quota_remaining(&self) -> u32 {
        self.quota.remaining()
    }

    /// Builds the Overpass QL statement for a bounding box.
    fn build_query(&self, bbox: &BoundingBox) -> String {
        let bb = format!(
            "({},{},{},{})",
            bbox.south, bbox.west, bbox.north, bbox.east
        );
        let timeout = self.config.query_timeout.as_secs();
        format!(
            "[out:json][timeout:{timeout}];(\
             node[\"amenity\"=\"fuel\"][\"hgv\"=\"yes\"]{bb};\
             way[\"amenity\"=\"fuel\"][\"hgv\"=\"yes\"]{bb};\
             node[\"amenity\"=\"fuel\"][\"name\"~\"{chains}\",i]{bb};\
             way[\"amenity\"=\"fuel\"][\"name\"~\"{chains}\",i]{bb};\
             node[\"highway\"=\"rest_area\"]{bb};\
             way[\"highway\"=\"rest_area\"]{bb};\
             node[\"highway\"=\"services\"]{bb};\
             way[\"highway\"=\"services\"]{bb};\
             );out center tags;",
            timeout = timeout,
            chains = CHAIN_NAME_PATTERN,
            bb = bb,
        )
    }

    async fn run_query(&self, bbox: BoundingBox) -> Result<Vec<CandidateFacility>, ProviderError> {
        // Quota first: an exhausted quota must not consume network
        if !self.quota.try_acquire() {
            info!(bbox = %bbox, "Discovery quota exhausted, skipping query");
            return Err(ProviderError::QuotaExceeded);
        }

        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ProviderError::Http("Provider is shut down".to_string()))?;

        let query = self.build_query(&bbox);
        debug!(bbox = %bbox, "Querying Overpass for facilities");

        let body = self
            .http
            .post_form(&self.config.endpoint, &[("data", query.as_str())])
            .await?;

        let response: OverpassResponse = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Malformed JSON: {}", e)))?;

        let total = response.elements.len();
        let candidates: Vec<CandidateFacility> = response
            .elements
            .into_iter()
            .filter_map(parse_element)
            .collect();

        info!(
            elements = total,
            candidates = candidates.len(),
            "Overpass query completed"
        );
        Ok(candidates)
    }
}

impl<C: HttpClient> DiscoveryProvider for OverpassProvider<C> {
    fn query(
        &self,
        bbox: BoundingBox,
    ) -> BoxFuture<'_, Result<Vec<CandidateFacility>, ProviderError>> {
        Box::pin(self.run_query(bbox))
    }

    fn name(&self) -> &str {
        "Overpass"
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    id: i64,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    center: Option<OverpassCenter>,
    #[serde(default)]
    version: Option<i64>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

/// Normalizes one Overpass element into a candidate facility.
///
/// Elements without usable coordinates are skipped, not errors: the
/// provider may legitimately return partial data.
fn parse_element(element: OverpassElement) -> Option<CandidateFacility> {
    let (lat, lon) = match (element.lat, element.lon, &element.center) {
        (Some(lat), Some(lon), _) => (lat, lon),
        (_, _, Some(center)) => (center.lat, center.lon),
        _ => {
            warn!(
                kind = %element.kind,
                id = element.id,
                "Skipping element without coordinates"
            );
            return None;
        }
    };

    let tags = &element.tags;
    let category = classify(tags);

    let name = tags
        .get("name")
        .or_else(|| tags.get("operator"))
        .or_else(|| tags.get("brand"))
        .cloned()
        .unwrap_or_else(|| format!("{} ({:.4}, {:.4})", category.label(), lat, lon));

    Some(CandidateFacility {
        name,
        category,
        latitude: lat,
        longitude: lon,
        external_id: Some(format!("{}/{}", element.kind, element.id)),
        external_version: element.version,
    })
}

/// Maps an element's tag bag to a facility category.
fn classify(tags: &HashMap<String, String>) -> FacilityCategory {
    let tag = |key: &str| tags.get(key).map(String::as_str);
    match (tag("amenity"), tag("highway")) {
        (Some("fuel"), _) => FacilityCategory::TruckStop,
        (_, Some("rest_area")) => FacilityCategory::RestArea,
        (_, Some("services")) => FacilityCategory::ServiceArea,
        _ => FacilityCategory::Other,
    }
}
