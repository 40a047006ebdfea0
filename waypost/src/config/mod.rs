//! Resolver configuration.
//!
//! `ResolverConfig` combines every tunable the resolution pipeline
//! recognizes, with documented defaults matching the production
//! deployment profile.

use std::time::Duration;

/// Default maximum age of a ledger record before its cell becomes
/// eligible for re-discovery.
///
/// Truck facilities change slowly; thirty days keeps external query
/// volume low without letting closures linger unnoticed for a season.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default cell key precision for lookups and the discovery ledger.
///
/// Six characters give cells of roughly 0.6 km × 1.2 km: small enough
/// that "have we queried this area?" is a meaningful question, large
/// enough that one discovery covers a useful neighborhood.
pub const DEFAULT_LOOKUP_PRECISION: usize = 6;

/// Default radius of an external discovery query in miles.
pub const DEFAULT_DISCOVERY_RADIUS_MILES: f64 = 5.0;

/// Default maximum distance for a coordinate to count as "at" a
/// facility, in miles.
pub const DEFAULT_MATCH_THRESHOLD_MILES: f64 = 0.3;

/// Default distance under which two similarly named facilities are
/// considered the same physical place (~250 feet).
pub const DEFAULT_DEDUP_PROXIMITY_MILES: f64 = 0.05;

/// Default daily ceiling on external discovery queries.
pub const DEFAULT_DAILY_QUOTA: u32 = 1000;

/// Default maximum simultaneous external discovery calls.
pub const DEFAULT_MAX_CONCURRENT_DISCOVERY_CALLS: usize = 2;

/// Default bound on a single external discovery query.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default hold-off after a failed discovery before the same cell may
/// be retried.
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Configuration for the facility resolution pipeline.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum age of a ledger record before re-discovery.
    pub freshness_window: Duration,

    /// Cell key precision for lookups and the ledger.
    pub lookup_precision: usize,

    /// Radius of an external discovery query in miles.
    pub discovery_radius_miles: f64,

    /// Maximum distance for a facility match in miles.
    pub match_threshold_miles: f64,

    /// Proximity bound for deduplication in miles.
    pub dedup_proximity_miles: f64,

    /// Daily ceiling on external discovery queries.
    pub daily_quota: u32,

    /// Maximum simultaneous external discovery calls.
    pub max_concurrent_discovery_calls: usize,

    /// Bound on a single external discovery query.
    pub discovery_timeout: Duration,

    /// Hold-off after a failed discovery for the affected cell.
    pub failure_backoff: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            lookup_precision: DEFAULT_LOOKUP_PRECISION,
            discovery_radius_miles: DEFAULT_DISCOVERY_RADIUS_MILES,
            match_threshold_miles: DEFAULT_MATCH_THRESHOLD_MILES,
            dedup_proximity_miles: DEFAULT_DEDUP_PROXIMITY_MILES,
            daily_quota: DEFAULT_DAILY_QUOTA,
            max_concurrent_discovery_calls: DEFAULT_MAX_CONCURRENT_DISCOVERY_CALLS,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
        }
    }
}

impl ResolverConfig {
    /// Set the freshness window.
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Set the lookup precision.
    pub fn with_lookup_precision(mut self, precision: usize) -> Self {
        self.lookup_precision = precision;
        self
    }

    /// Set the discovery radius.
    pub fn with_discovery_radius_miles(mut self, radius: f64) -> Self {
        self.discovery_radius_miles = radius;
        self
    }

    /// Set the match threshold.
    pub fn with_match_threshold_miles(mut self, threshold: f64) -> Self {
        self.match_threshold_miles = threshold;
        self
    }

    /// Set the dedup proximity.
    pub fn with_dedup_proximity_miles(mut self, proximity: f64) -> Self {
        self.dedup_proximity_miles = proximity;
        self
    }

    /// Set the daily discovery quota.
    pub fn with_daily_quota(mut self, quota: u32) -> Self {
        self.daily_quota = quota;
        self
    }

    /// Set the maximum concurrent discovery calls.
    pub fn with_max_concurrent_discovery_calls(mut self, max: usize) -> Self {
        self.max_concurrent_discovery_calls = max;
        self
    }

    /// Set the discovery timeout.
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the failure backoff.
    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ResolverConfig::default();
        assert_eq!(config.freshness_window, Duration::from_secs(2_592_000));
        assert_eq!(config.lookup_precision, 6);
        assert_eq!(config.discovery_radius_miles, 5.0);
        assert_eq!(config.match_threshold_miles, 0.3);
        assert_eq!(config.dedup_proximity_miles, 0.05);
        assert_eq!(config.daily_quota, 1000);
        assert_eq!(config.max_concurrent_discovery_calls, 2);
        assert_eq!(config.discovery_timeout, Duration::from_secs(30));
        assert_eq!(config.failure_backoff, Duration::from_secs(300));
    }

    #[test]
    fn test_builder_chain() {
        let config = ResolverConfig::default()
            .with_freshness_window(Duration::from_secs(60))
            .with_lookup_precision(7)
            .with_discovery_radius_miles(2.5)
            .with_match_threshold_miles(0.1)
            .with_daily_quota(50)
            .with_discovery_timeout(Duration::from_secs(5))
            .with_failure_backoff(Duration::from_millis(200));

        assert_eq!(config.freshness_window, Duration::from_secs(60));
        assert_eq!(config.lookup_precision, 7);
        assert_eq!(config.discovery_radius_miles, 2.5);
        assert_eq!(config.match_threshold_miles, 0.1);
        assert_eq!(config.daily_quota, 50);
        assert_eq!(config.discovery_timeout, Duration::from_secs(5));
        assert_eq!(config.failure_backoff, Duration::from_millis(200));
    }
}
