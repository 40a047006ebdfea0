//! Facility resolution façade.
//!
//! [`FacilityResolver`] combines the store, ledger, deduplicator, and
//! discovery coordinator into the public `resolve(lat, lon)` contract:
//!
//! 1. nearest-facility lookup against the local store (fast path)
//! 2. on miss, consult the discovery ledger's freshness decision and
//!    the failure backoff
//! 3. if a query is warranted, run (or attach to) the single-flight
//!    discovery for the cell
//! 4. re-run the lookup once, whatever the discovery outcome was
//!
//! Discovery failures never propagate: a resolution call degrades to
//! "no facility found" and the caller's workflow continues. Only
//! malformed input and storage faults surface as errors.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::coordinator::{DiscoveryCoordinator, DiscoveryOutcome};
use crate::dedup::Deduplicator;
use crate::facility::{Facility, FacilityMatch};
use crate::geocell::{self, CellError};
use crate::provider::DiscoveryProvider;
use crate::store::{DiscoveryLedger, FacilityStore, StoreError};

/// Errors a resolution call can surface.
///
/// Discovery-path failures are deliberately absent: they degrade to an
/// empty result at this boundary.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The input coordinate is out of range; rejected before any lookup.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(#[from] CellError),

    /// The storage backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Façade combining the resolution pipeline behind `resolve(lat, lon)`.
pub struct FacilityResolver {
    store: Arc<dyn FacilityStore>,
    ledger: Arc<dyn DiscoveryLedger>,
    coordinator: Arc<DiscoveryCoordinator>,
    config: ResolverConfig,
}

impl FacilityResolver {
    /// Creates a resolver over injected collaborators.
    ///
    /// The deduplicator and single-flight coordinator are constructed
    /// here from the shared configuration.
    pub fn new(
        store: Arc<dyn FacilityStore>,
        ledger: Arc<dyn DiscoveryLedger>,
        provider: Arc<dyn DiscoveryProvider>,
        config: ResolverConfig,
    ) -> Self {
        let dedup = Deduplicator::new(config.dedup_proximity_miles);
        let coordinator = Arc::new(DiscoveryCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            provider,
            dedup,
            config.clone(),
        ));
        Self {
            store,
            ledger,
            coordinator,
            config,
        }
    }

    /// Resolves a coordinate to the nearest facility within the
    /// configured match threshold.
    pub async fn resolve(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<Option<FacilityMatch>, ResolveError> {
        self.resolve_within(lat, lon, self.config.match_threshold_miles)
            .await
    }

    /// Resolves a coordinate with an explicit match threshold in miles.
    pub async fn resolve_within(
        &self,
        lat: f64,
        lon: f64,
        threshold_miles: f64,
    ) -> Result<Option<FacilityMatch>, ResolveError> {
        // Validates the coordinate before any lookup
        let cell = geocell::encode(lat, lon, self.config.lookup_precision)?;

        // Fast path: the local store already knows a facility here
        if let Some(facility) = self.store.nearest(lat, lon, threshold_miles).await? {
            debug!(cell = %cell, facility = %facility.name, "Resolved from local store");
            return Ok(Some(self.to_match(facility, lat, lon)));
        }

        // Miss: is this cell due for discovery at all?
        if !self
            .ledger
            .should_query(&cell, self.config.freshness_window)
            .await?
        {
            debug!(cell = %cell, "Cell recently discovered, no facility nearby");
            return Ok(None);
        }
        if self.coordinator.is_backed_off(&cell) {
            debug!(cell = %cell, "Cell in failure backoff, skipping discovery");
            return Ok(None);
        }

        // Single-flight discovery, then one re-read regardless of
        // outcome: another caller's discovery may have populated the
        // store even if ours timed out
        let outcome = self.coordinator.discover(&cell, lat, lon).await;
        match &outcome {
            DiscoveryOutcome::Completed { found, inserted } => {
                info!(cell = %cell, found, inserted, "Discovery finished");
            }
            other => {
                info!(cell = %cell, outcome = ?other, "Discovery unavailable");
            }
        }

        let facility = self.store.nearest(lat, lon, threshold_miles).await?;
        Ok(facility.map(|f| self.to_match(f, lat, lon)))
    }

    /// The configuration this resolver runs with.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The single-flight coordinator, for shutdown wiring.
    pub fn coordinator(&self) -> &Arc<DiscoveryCoordinator> {
        &self.coordinator
    }

    fn to_match(&self, facility: Facility, lat: f64, lon: f64) -> FacilityMatch {
        let distance_miles =
            geocell::distance_miles(lat, lon, facility.latitude, facility.longitude);
        FacilityMatch {
            facility_id: facility.id,
            name: facility.name,
            distance_miles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::{CandidateFacility, DataSource, FacilityCategory};
    use crate::provider::ProviderError;
    use crate::store::{BoxFuture, MemoryDiscoveryLedger, MemoryFacilityStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NeverProvider {
        calls: AtomicUsize,
    }

    impl DiscoveryProvider for NeverProvider {
        fn query(
            &self,
            _bbox: crate::geocell::BoundingBox,
        ) -> BoxFuture<'_, Result<Vec<CandidateFacility>, ProviderError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(Vec::new()) })
        }

        fn name(&self) -> &str {
            "Never"
        }
    }

    fn resolver_with_store() -> (Arc<MemoryFacilityStore>, Arc<NeverProvider>, FacilityResolver) {
        let store = Arc::new(MemoryFacilityStore::new(6));
        let ledger = Arc::new(MemoryDiscoveryLedger::new());
        let provider = Arc::new(NeverProvider {
            calls: AtomicUsize::new(0),
        });
        let resolver = FacilityResolver::new(
            Arc::clone(&store) as Arc<dyn FacilityStore>,
            ledger as Arc<dyn DiscoveryLedger>,
            Arc::clone(&provider) as Arc<dyn DiscoveryProvider>,
            ResolverConfig::default(),
        );
        (store, provider, resolver)
    }

    #[tokio::test]
    async fn test_invalid_coordinate_rejected_before_lookup() {
        let (_store, provider, resolver) = resolver_with_store();

        let err = resolver.resolve(91.0, 0.0).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidCoordinate(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_discovery() {
        let (store, provider, resolver) = resolver_with_store();
        store
            .insert(
                CandidateFacility {
                    name: "Love's Travel Stop".to_string(),
                    category: FacilityCategory::TruckStop,
                    latitude: 36.7780,
                    longitude: -119.4175,
                    external_id: Some("node/101".to_string()),
                    external_version: None,
                },
                DataSource::External,
            )
            .await
            .unwrap();

        let resolved = resolver.resolve(36.7783, -119.4179).await.unwrap().unwrap();
        assert_eq!(resolved.name, "Love's Travel Stop");
        assert!(resolved.distance_miles < 0.05);
        assert_eq!(
            provider.calls.load(Ordering::SeqCst),
            0,
            "hit path must not touch the provider"
        );
    }

    #[tokio::test]
    async fn test_miss_triggers_discovery_then_returns_none() {
        let (_store, provider, resolver) = resolver_with_store();

        let resolved = resolver.resolve(36.7783, -119.4179).await.unwrap();
        assert!(resolved.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_empty_cell_not_requeried() {
        let (_store, provider, resolver) = resolver_with_store();

        resolver.resolve(36.7783, -119.4179).await.unwrap();
        resolver.resolve(36.7783, -119.4179).await.unwrap();

        assert_eq!(
            provider.calls.load(Ordering::SeqCst),
            1,
            "confirmed-empty cell must not be requeried in the window"
        );
    }

    #[tokio::test]
    async fn test_match_respects_explicit_threshold() {
        let (store, _provider, resolver) = resolver_with_store();
        store
            .insert(
                CandidateFacility {
                    name: "Distant Stop".to_string(),
                    category: FacilityCategory::TruckStop,
                    latitude: 36.7810,
                    longitude: -119.4175,
                    external_id: None,
                    external_version: None,
                },
                DataSource::Manual,
            )
            .await
            .unwrap();

        // ~0.19 miles away: inside the default threshold...
        let hit = resolver.resolve(36.7783, -119.4179).await.unwrap();
        assert!(hit.is_some());

        // ...but outside a tightened one. The store now satisfies the
        // cell's candidates, yet distance filtering still applies
        let miss = resolver
            .resolve_within(36.7783, -119.4179, 0.1)
            .await
            .unwrap();
        assert!(miss.is_none());
    }
}
