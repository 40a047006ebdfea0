//! Facility and discovery-ledger persistence.
//!
//! The [`FacilityStore`] and [`DiscoveryLedger`] traits define the
//! schema-level storage contract; [`memory`] provides the in-memory
//! reference backends used by tests and the CLI.

mod memory;
mod traits;

pub use memory::{MemoryDiscoveryLedger, MemoryFacilityStore};
pub use traits::{BoxFuture, DiscoveryLedger, DiscoveryRecord, FacilityStore, StoreError};
