use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use relay_core::{AggregateSnapshot, FetchError, MetricsSnapshot, RefreshFailure, Source};
use relay_sources::{CredentialStore, SourceRegistry};
use relay_store::{MetricsCache, PublicationStore};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};

/// Drives refresh cycles across every tracked source and owns the aggregate
/// view: the in-memory snapshot, the durable cache, and the cross-process
/// publication record all change only through this type.
pub struct RefreshOrchestrator {
    registry: SourceRegistry,
    credentials: Arc<dyn CredentialStore>,
    cache: MetricsCache,
    publication: PublicationStore,
    state: Mutex<SharedState>,
    // Serializes merge + publish across overlapping cycles so consumers
    // never observe a partially merged aggregate.
    cycle_lock: tokio::sync::Mutex<()>,
    refreshing: AtomicBool,
    cycle_tx: watch::Sender<AggregateSnapshot>,
}

struct SharedState {
    aggregate: AggregateSnapshot,
    failures: BTreeMap<Source, RefreshFailure>,
    last_error: Option<RefreshFailure>,
}

impl RefreshOrchestrator {
    /// Builds the orchestrator and warm-starts the aggregate from the cache
    /// so a restarted process shows data before its first fetch completes.
    pub fn new(
        registry: SourceRegistry,
        credentials: Arc<dyn CredentialStore>,
        cache: MetricsCache,
        publication: PublicationStore,
    ) -> Self {
        let aggregate = cache.load();
        if !aggregate.is_empty() {
            info!(sources = aggregate.len(), "warm-started aggregate from cache");
        }
        let (cycle_tx, _) = watch::channel(aggregate.clone());
        Self {
            registry,
            credentials,
            cache,
            publication,
            state: Mutex::new(SharedState {
                aggregate,
                failures: BTreeMap::new(),
                last_error: None,
            }),
            cycle_lock: tokio::sync::Mutex::new(()),
            refreshing: AtomicBool::new(false),
            cycle_tx,
        }
    }

    pub fn current_aggregate(&self) -> AggregateSnapshot {
        self.state().aggregate.clone()
    }

    /// Most recent fetch failure of the most recent cycle, if that cycle had
    /// one. Diagnostic only; the cached per-source data stays authoritative.
    pub fn last_error(&self) -> Option<RefreshFailure> {
        self.state().last_error.clone()
    }

    /// Latest failure for one source, cleared by that source's next success.
    pub fn source_failure(&self, source: Source) -> Option<RefreshFailure> {
        self.state().failures.get(&source).cloned()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    pub fn is_eligible(&self, source: Source) -> bool {
        self.credentials.is_eligible(source)
    }

    /// Receives the aggregate exactly once per completed refresh cycle.
    pub fn subscribe(&self) -> watch::Receiver<AggregateSnapshot> {
        self.cycle_tx.subscribe()
    }

    /// Refreshes every registered source, then persists and publishes the
    /// merged aggregate once. A source that fails only keeps its prior
    /// state; it can never regress the aggregate.
    pub async fn refresh_all(&self) -> Result<AggregateSnapshot> {
        let targets = self.registry.sources();
        self.run_cycle(&targets).await
    }

    /// User-triggered refresh of a single source under the same
    /// degradation rules as a full cycle.
    pub async fn refresh(&self, source: Source) -> Result<AggregateSnapshot> {
        if self.registry.client(source).is_none() {
            return Err(AppError::NotFound(format!("no client for source {source}")));
        }
        self.run_cycle(&[source]).await
    }

    /// Explicit user reset: drops the aggregate, the cache, and the
    /// published record. The only path that ever deletes published data.
    pub async fn reset(&self) -> Result<()> {
        let _cycle = self.cycle_lock.lock().await;
        {
            let mut state = self.state();
            state.aggregate = AggregateSnapshot::default();
            state.failures.clear();
            state.last_error = None;
        }
        let empty = AggregateSnapshot::default();
        self.cache.save(&empty)?;
        self.publication.clear()?;
        self.publication.notify();
        self.cycle_tx.send_replace(empty);
        info!("aggregate reset");
        Ok(())
    }

    async fn run_cycle(&self, targets: &[Source]) -> Result<AggregateSnapshot> {
        let _cycle = self.cycle_lock.lock().await;
        self.refreshing.store(true, Ordering::SeqCst);
        let result = self.run_cycle_locked(targets).await;
        self.refreshing.store(false, Ordering::SeqCst);
        result
    }

    async fn run_cycle_locked(&self, targets: &[Source]) -> Result<AggregateSnapshot> {
        let mut fetches = JoinSet::new();
        for &source in targets {
            let Some(client) = self.registry.client(source) else {
                continue;
            };
            if !self.credentials.is_eligible(source) {
                debug!(source = source.key(), "no credentials, keeping cached view");
                continue;
            }
            fetches.spawn(async move { (source, client.fetch().await) });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => warn!("fetch task aborted: {err}"),
            }
        }

        let aggregate = self.merge(outcomes);
        self.cache.save(&aggregate)?;
        self.publication.publish(&aggregate)?;
        self.publication.notify();
        self.cycle_tx.send_replace(aggregate.clone());
        Ok(aggregate)
    }

    /// Folds one cycle's outcomes into the shared aggregate. Success
    /// replaces the source's entry; failure records a diagnostic and leaves
    /// any prior entry untouched (stale-but-present beats empty).
    fn merge(
        &self,
        outcomes: Vec<(Source, std::result::Result<MetricsSnapshot, FetchError>)>,
    ) -> AggregateSnapshot {
        let mut state = self.state();
        state.last_error = None;
        for (source, outcome) in outcomes {
            match outcome {
                Ok(snapshot) => {
                    debug!(source = source.key(), windows = snapshot.windows.len(), "merged snapshot");
                    state.failures.remove(&source);
                    state.aggregate.insert(snapshot);
                }
                Err(error) => {
                    warn!(source = source.key(), "fetch failed, keeping cached entry: {error}");
                    let failure = RefreshFailure::new(source, &error);
                    state.failures.insert(source, failure.clone());
                    state.last_error = Some(failure);
                }
            }
        }
        state.aggregate.clone()
    }

    fn state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
