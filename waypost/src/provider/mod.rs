//! External geodata provider abstraction.
//!
//! This module provides the trait and implementation for discovering
//! truck-relevant facilities from an external geospatial data source,
//! together with the outbound resource limits (concurrency ceiling,
//! rolling daily quota) that protect both sides of the connection.

mod http;
mod overpass;
mod quota;
mod types;

pub use http::{HttpClient, ReqwestClient, DEFAULT_USER_AGENT};
pub use overpass::{OverpassConfig, OverpassProvider, OVERPASS_DEFAULT_ENDPOINT};
pub use quota::DailyQuota;
pub use types::{DiscoveryProvider, ProviderError};

#[cfg(test)]
pub use http::tests::MockHttpClient;
