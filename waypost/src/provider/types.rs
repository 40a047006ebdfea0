//! Provider types and traits.

use thiserror::Error;

use crate::facility::CandidateFacility;
use crate::geocell::BoundingBox;
use crate::store::BoxFuture;

/// Errors that can occur during external discovery queries.
///
/// All variants are `Clone` so a single failure can fan out to every
/// resolver attached to the same in-flight discovery. The three network
/// failure kinds are distinguished so callers can apply different
/// backoff policy; at the resolver boundary they all degrade to "no
/// facility found".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The provider did not answer within the bounded timeout.
    #[error("Provider request timed out")]
    Timeout,

    /// Transport failure or non-success HTTP status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered with a body that could not be parsed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The rolling daily quota is exhausted; no network call was made.
    #[error("Daily discovery quota exhausted")]
    QuotaExceeded,
}

/// Trait for external geodata discovery providers.
///
/// Implementors run a bounding-box tag-filtered query against their
/// backing service and normalize the results into candidate facilities.
/// Zero results, partial lists, and outright failures are all valid,
/// handled outcomes.
///
/// # Dyn Compatibility
///
/// Uses `Pin<Box<dyn Future>>` so the coordinator can hold providers as
/// `Arc<dyn DiscoveryProvider>`.
pub trait DiscoveryProvider: Send + Sync {
    /// Queries the provider for truck-relevant facilities inside `bbox`.
    fn query(
        &self,
        bbox: BoundingBox,
    ) -> BoxFuture<'_, Result<Vec<CandidateFacility>, ProviderError>>;

    /// Returns the provider's name for logging and identification.
    fn name(&self) -> &str;
}
