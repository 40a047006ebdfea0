//! Waypost - nearest truck-facility resolution with self-populating
//! discovery.
//!
//! This library resolves raw GPS coordinates to the nearest
//! truck-relevant facility (truck stop, rest area, service area). It
//! builds its knowledge base lazily: geographic cells are discovered
//! from an external geodata provider the first time a caller lands in
//! them, and the results are persisted so later callers nearby resolve
//! from the local store in milliseconds.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use waypost::config::ResolverConfig;
//! use waypost::provider::{OverpassConfig, OverpassProvider, ReqwestClient};
//! use waypost::resolver::FacilityResolver;
//! use waypost::store::{MemoryDiscoveryLedger, MemoryFacilityStore};
//!
//! let config = ResolverConfig::default();
//! let store = Arc::new(MemoryFacilityStore::new(config.lookup_precision));
//! let ledger = Arc::new(MemoryDiscoveryLedger::new());
//! let provider = Arc::new(OverpassProvider::new(
//!     ReqwestClient::new()?,
//!     OverpassConfig::default(),
//! ));
//! let resolver = FacilityResolver::new(store, ledger, provider, config);
//!
//! let resolved = resolver.resolve(36.7783, -119.4179).await?;
//! ```

pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod facility;
pub mod geocell;
pub mod logging;
pub mod provider;
pub mod resolver;
pub mod store;

/// Version of the waypost library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
