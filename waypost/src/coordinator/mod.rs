//! Single-flight discovery coordination.
//!
//! The coordinator guarantees that **at most one external discovery per
//! cell key is in flight at any time**, no matter how many resolvers
//! miss on that cell simultaneously. Late callers attach to the
//! existing operation and receive its outcome when it completes.
//!
//! # State Machine
//!
//! ```text
//! Idle --[first discover(cell)]--> InFlight
//! InFlight --[success | timeout | error]--> Idle
//! InFlight --[discover(cell) from another caller]--> InFlight (attach)
//! ```
//!
//! # Caller Independence
//!
//! The owning discovery runs in a spawned task. Dropping an individual
//! caller's future (an abandoned upstream request) never cancels the
//! shared work; other waiters may still depend on its outcome. Only
//! [`DiscoveryCoordinator::shutdown`] stops in-flight discoveries.
//!
//! # Failure Handling
//!
//! - Timeout / provider error: the ledger is **not** written, so the
//!   freshness window cannot suppress a near-term retry; instead a
//!   short fixed backoff is recorded so a systematically failing cell
//!   is not hammered.
//! - Quota exhaustion: nothing is recorded; the cell becomes eligible
//!   again as soon as quota resets.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ResolverConfig;
use crate::dedup::Deduplicator;
use crate::facility::DataSource;
use crate::geocell;
use crate::provider::{DiscoveryProvider, ProviderError};
use crate::store::{DiscoveryLedger, FacilityStore};

/// Extra time a waiter allows beyond the discovery timeout before
/// giving up on an in-flight operation.
pub const DISCOVERY_WAIT_GRACE: Duration = Duration::from_secs(5);

/// Terminal result of a discovery operation.
///
/// Every resolver attached to the same in-flight discovery observes the
/// same outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// The provider answered; the ledger was updated.
    Completed {
        /// Elements the provider returned.
        found: usize,
        /// New facility rows created after deduplication.
        inserted: usize,
    },
    /// The provider did not answer in time, or the waiter's own bound
    /// elapsed. The ledger is unchanged; backoff applies.
    Timeout,
    /// The provider failed outright. The ledger is unchanged; backoff
    /// applies.
    Failed,
    /// The daily quota is exhausted. Nothing was recorded.
    QuotaExhausted,
}

/// Per-cell single-flight orchestration of the discovery path.
pub struct DiscoveryCoordinator {
    task: DiscoveryTask,
    in_flight: Arc<DashMap<String, broadcast::Sender<DiscoveryOutcome>>>,
    shutdown: CancellationToken,
}

/// Everything an owning discovery needs, cloneable into its task.
#[derive(Clone)]
struct DiscoveryTask {
    store: Arc<dyn FacilityStore>,
    ledger: Arc<dyn DiscoveryLedger>,
    provider: Arc<dyn DiscoveryProvider>,
    dedup: Deduplicator,
    config: ResolverConfig,
    in_flight: Arc<DashMap<String, broadcast::Sender<DiscoveryOutcome>>>,
    backoff: Arc<DashMap<String, Instant>>,
}

impl DiscoveryCoordinator {
    /// Creates a coordinator over the given collaborators.
    pub fn new(
        store: Arc<dyn FacilityStore>,
        ledger: Arc<dyn DiscoveryLedger>,
        provider: Arc<dyn DiscoveryProvider>,
        dedup: Deduplicator,
        config: ResolverConfig,
    ) -> Self {
        let in_flight = Arc::new(DashMap::new());
        let task = DiscoveryTask {
            store,
            ledger,
            provider,
            dedup,
            config,
            in_flight: Arc::clone(&in_flight),
            backoff: Arc::new(DashMap::new()),
        };
        Self {
            task,
            in_flight,
            shutdown: CancellationToken::new(),
        }
    }

    /// Runs or attaches to the discovery for a cell and returns its
    /// outcome.
    ///
    /// If no discovery for `cell_key` is in flight, this caller becomes
    /// the owner and a task is spawned to run it to completion.
    /// Otherwise the caller attaches to the existing operation. Either
    /// way the wait is bounded; a waiter whose bound elapses receives
    /// [`DiscoveryOutcome::Timeout`] while the shared work continues
    /// for the remaining waiters.
    pub async fn discover(&self, cell_key: &str, lat: f64, lon: f64) -> DiscoveryOutcome {
        let mut rx = match self.in_flight.entry(cell_key.to_string()) {
            Entry::Occupied(existing) => {
                debug!(cell = %cell_key, "Attaching to in-flight discovery");
                existing.get().subscribe()
            }
            Entry::Vacant(slot) => {
                let (tx, rx) = broadcast::channel(1);
                slot.insert(tx.clone());

                let task = self.task.clone();
                let cell = cell_key.to_string();
                let shutdown = self.shutdown.clone();
                tokio::spawn(async move {
                    task.run(cell, lat, lon, tx, shutdown).await;
                });
                rx
            }
        };

        let bound = self.task.config.discovery_timeout + DISCOVERY_WAIT_GRACE;
        match tokio::time::timeout(bound, rx.recv()).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                // Owner dropped without broadcasting (shutdown mid-run)
                warn!(cell = %cell_key, "Discovery ended without an outcome");
                DiscoveryOutcome::Failed
            }
            Err(_) => {
                warn!(cell = %cell_key, "Gave up waiting on in-flight discovery");
                DiscoveryOutcome::Timeout
            }
        }
    }

    /// Whether the cell is inside its post-failure hold-off.
    ///
    /// Expired entries are cleared on the way out.
    pub fn is_backed_off(&self, cell_key: &str) -> bool {
        // Read the deadline and release the map guard before any remove
        let active = self
            .task
            .backoff
            .get(cell_key)
            .map(|until| *until > Instant::now());
        match active {
            Some(true) => true,
            Some(false) => {
                self.task.backoff.remove(cell_key);
                false
            }
            None => false,
        }
    }

    /// Number of discoveries currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Stops all in-flight discoveries.
    ///
    /// Waiters on stopped discoveries observe [`DiscoveryOutcome::Failed`].
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl DiscoveryTask {
    /// Runs one owned discovery to completion and fans the outcome out.
    async fn run(
        self,
        cell_key: String,
        lat: f64,
        lon: f64,
        tx: broadcast::Sender<DiscoveryOutcome>,
        shutdown: CancellationToken,
    ) {
        let outcome = tokio::select! {
            outcome = self.execute(&cell_key, lat, lon) => outcome,
            _ = shutdown.cancelled() => {
                info!(cell = %cell_key, "Discovery cancelled by shutdown");
                DiscoveryOutcome::Failed
            }
        };

        // Remove the in-flight entry before broadcasting so a caller
        // arriving between the two starts a fresh discovery instead of
        // subscribing to a dead channel
        self.in_flight.remove(&cell_key);
        let _ = tx.send(outcome);
    }

    async fn execute(&self, cell_key: &str, lat: f64, lon: f64) -> DiscoveryOutcome {
        let bbox = match geocell::bounding_box(lat, lon, self.config.discovery_radius_miles) {
            Ok(bbox) => bbox,
            Err(e) => {
                error!(cell = %cell_key, error = %e, "Cannot build discovery bounding box");
                return DiscoveryOutcome::Failed;
            }
        };

        info!(
            cell = %cell_key,
            provider = self.provider.name(),
            bbox = %bbox,
            "Starting discovery"
        );

        let result = tokio::time::timeout(self.config.discovery_timeout, {
            let provider = Arc::clone(&self.provider);
            async move { provider.query(bbox).await }
        })
        .await;

        let candidates = match result {
            Err(_) => {
                warn!(cell = %cell_key, "Discovery timed out");
                self.note_failure(cell_key);
                return DiscoveryOutcome::Timeout;
            }
            Ok(Err(ProviderError::Timeout)) => {
                warn!(cell = %cell_key, "Provider reported timeout");
                self.note_failure(cell_key);
                return DiscoveryOutcome::Timeout;
            }
            Ok(Err(ProviderError::QuotaExceeded)) => {
                info!(cell = %cell_key, "Discovery skipped: quota exhausted");
                return DiscoveryOutcome::QuotaExhausted;
            }
            Ok(Err(e)) => {
                warn!(cell = %cell_key, error = %e, "Discovery failed");
                self.note_failure(cell_key);
                return DiscoveryOutcome::Failed;
            }
            Ok(Ok(candidates)) => candidates,
        };

        let found = candidates.len();
        let mut inserted = 0usize;

        for candidate in candidates {
            match self.dedup.find_existing(&candidate, self.store.as_ref()).await {
                Ok(Some(existing)) => {
                    if let Err(e) = self
                        .store
                        .refresh_verification(&existing.id, candidate.external_version)
                        .await
                    {
                        warn!(facility = %existing.id, error = %e, "Failed to refresh facility");
                    }
                }
                Ok(None) => {
                    match self.store.insert(candidate, DataSource::External).await {
                        Ok(facility) => {
                            inserted += 1;
                            debug!(facility = %facility.name, cell = %facility.cell_key, "Imported facility");
                        }
                        Err(e) => warn!(cell = %cell_key, error = %e, "Failed to insert facility"),
                    }
                }
                Err(e) => warn!(cell = %cell_key, error = %e, "Dedup check failed"),
            }
        }

        // Record the query even when nothing was found, so confirmed
        // empty cells are not re-queried inside the freshness window
        if let Err(e) = self
            .ledger
            .record(
                cell_key,
                (lat, lon),
                self.config.discovery_radius_miles,
                found as u32,
            )
            .await
        {
            error!(cell = %cell_key, error = %e, "Failed to record discovery");
        }

        info!(cell = %cell_key, found, inserted, "Discovery completed");
        DiscoveryOutcome::Completed { found, inserted }
    }

    fn note_failure(&self, cell_key: &str) {
        self.backoff
            .insert(cell_key.to_string(), Instant::now() + self.config.failure_backoff);
    }
}
