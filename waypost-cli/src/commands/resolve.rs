//! One-shot facility resolution against the live provider.
//!
//! Runs a single `resolve` through a fresh in-memory store, so every
//! invocation exercises the discovery path end to end. Useful for
//! checking what the external provider knows about an area before any
//! service is deployed against it.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tracing::info;

use waypost::config::ResolverConfig;
use waypost::provider::{OverpassConfig, OverpassProvider, ReqwestClient};
use waypost::resolver::FacilityResolver;
use waypost::store::{MemoryDiscoveryLedger, MemoryFacilityStore};

/// Arguments for the `resolve` command.
#[derive(Args)]
pub struct ResolveArgs {
    /// Latitude in decimal degrees
    pub lat: f64,

    /// Longitude in decimal degrees
    pub lon: f64,

    /// Maximum distance to count as "at" a facility, in miles
    #[arg(long, default_value = "0.3")]
    pub threshold: f64,

    /// Discovery query radius in miles
    #[arg(long, default_value = "5.0")]
    pub radius: f64,

    /// Provider query timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

/// Runs the `resolve` command.
pub fn resolve(args: ResolveArgs) -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(args))
}

async fn run(args: ResolveArgs) -> Result<(), Box<dyn Error>> {
    let config = ResolverConfig::default()
        .with_match_threshold_miles(args.threshold)
        .with_discovery_radius_miles(args.radius)
        .with_discovery_timeout(Duration::from_secs(args.timeout));

    let overpass_config = OverpassConfig {
        query_timeout: config.discovery_timeout,
        ..OverpassConfig::default()
    };
    // HTTP timeout sits above the server-side query timeout
    let http = ReqwestClient::with_timeout(config.discovery_timeout + Duration::from_secs(5))?;

    let store = Arc::new(MemoryFacilityStore::new(config.lookup_precision));
    let ledger = Arc::new(MemoryDiscoveryLedger::new());
    let provider = Arc::new(OverpassProvider::new(http, overpass_config));
    let resolver = FacilityResolver::new(store, ledger, provider, config);

    info!(lat = args.lat, lon = args.lon, "Resolving coordinate");

    match resolver.resolve(args.lat, args.lon).await? {
        Some(found) => {
            println!("Facility: {}", found.name);
            println!("  id:       {}", found.facility_id);
            println!("  distance: {:.2} miles", found.distance_miles);
        }
        None => {
            println!(
                "No facility within {:.2} miles of ({}, {})",
                args.threshold, args.lat, args.lon
            );
        }
    }

    Ok(())
}
