//! The extension facade: attack lifecycle plus cached discovery.

use crate::config::Config;
use crate::discovery::{DiscoveryKind, Target, TargetDiscovery};
use crate::error::Result;
use crate::faults::TerminationConfig;
use crate::instance::InstanceDirectory;
use crate::kong::Connector;
use crate::resolver::{ResourceResolver, Selector};
use crate::termination::{AttackState, RequestTermination};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Targets of the most recent discovery cycle.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSnapshot {
    pub targets: Vec<Target>,
    /// `None` until the first cycle completes.
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Periodically refreshed discovery results.
pub struct TargetCache {
    discovery: TargetDiscovery,
    interval: Duration,
    snapshot: RwLock<TargetSnapshot>,
    cycles: AtomicU64,
}

impl TargetCache {
    pub fn new(discovery: TargetDiscovery, interval: Duration) -> Self {
        Self {
            discovery,
            interval,
            snapshot: RwLock::new(TargetSnapshot::default()),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> DiscoveryKind {
        self.discovery.kind()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a cycle now and replace the cached snapshot.
    ///
    /// The snapshot is stamped with the time the cycle started. A cycle that
    /// finishes after a newer one never replaces it; the newer snapshot is
    /// returned instead.
    pub async fn refresh_now(&self) -> TargetSnapshot {
        let started_at = Utc::now();
        let targets = self.discovery.discover().await;
        self.cycles.fetch_add(1, Ordering::Relaxed);

        let snapshot = self
            .install(TargetSnapshot {
                targets,
                refreshed_at: Some(started_at),
            })
            .await;

        debug!(
            kind = %self.kind(),
            targets = snapshot.targets.len(),
            "Refreshed target cache"
        );
        snapshot
    }

    /// Store `candidate` unless the cache already holds a newer snapshot.
    async fn install(&self, candidate: TargetSnapshot) -> TargetSnapshot {
        let mut current = self.snapshot.write().await;
        if candidate.refreshed_at >= current.refreshed_at {
            *current = candidate;
        } else {
            debug!(kind = %self.kind(), "Discarded stale discovery cycle");
        }
        current.clone()
    }

    /// Last cached snapshot, without contacting Kong.
    pub async fn snapshot(&self) -> TargetSnapshot {
        self.snapshot.read().await.clone()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Refresh on the configured interval, starting immediately.
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                cache.refresh_now().await;
            }
        })
    }
}

/// Counters snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtensionStats {
    pub prepared: u64,
    pub started: u64,
    pub stopped: u64,
    pub failed: u64,
    pub discovery_cycles: u64,
}

/// Entry point tying the attack to the discovery caches.
pub struct KongExtension {
    termination: RequestTermination,
    directory: InstanceDirectory,
    services: Arc<TargetCache>,
    routes: Arc<TargetCache>,
    prepared: AtomicU64,
    started: AtomicU64,
    stopped: AtomicU64,
    failed: AtomicU64,
}

impl KongExtension {
    /// Build from configuration over the given connector.
    pub fn new(config: &Config, connector: Arc<dyn Connector>) -> Result<Self> {
        let directory = config.directory();
        let discovery = &config.discovery;

        let services = TargetDiscovery::new(
            DiscoveryKind::Services,
            directory.clone(),
            Arc::clone(&connector),
            discovery.service_excludes()?,
        );
        let routes = TargetDiscovery::new(
            DiscoveryKind::Routes,
            directory.clone(),
            Arc::clone(&connector),
            discovery.route_excludes()?,
        );

        info!(
            instances = directory.len(),
            services_interval_secs = discovery.services_interval_secs,
            routes_interval_secs = discovery.routes_interval_secs,
            "Kong chaos extension initialized"
        );

        Ok(Self {
            termination: RequestTermination::new(ResourceResolver::new(
                directory.clone(),
                connector,
            )),
            directory,
            services: Arc::new(TargetCache::new(services, discovery.services_interval())),
            routes: Arc::new(TargetCache::new(routes, discovery.routes_interval())),
            prepared: AtomicU64::new(0),
            started: AtomicU64::new(0),
            stopped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    /// Build over HTTP Admin API clients.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config, Arc::new(config.connector()))
    }

    pub fn directory(&self) -> &InstanceDirectory {
        &self.directory
    }

    pub fn services(&self) -> &Arc<TargetCache> {
        &self.services
    }

    pub fn routes(&self) -> &Arc<TargetCache> {
        &self.routes
    }

    pub fn cache(&self, kind: DiscoveryKind) -> &Arc<TargetCache> {
        match kind {
            DiscoveryKind::Services => &self.services,
            DiscoveryKind::Routes => &self.routes,
        }
    }

    /// Start background refresh of both caches.
    pub fn spawn_discovery(&self) -> Vec<JoinHandle<()>> {
        vec![self.services.spawn_refresh(), self.routes.spawn_refresh()]
    }

    pub async fn prepare(
        &self,
        selector: &Selector,
        config: &TerminationConfig,
    ) -> Result<AttackState> {
        let result = self.termination.prepare(selector, config).await;
        self.record(&self.prepared, "prepare", &result);
        result
    }

    pub async fn start(&self, state: &AttackState) -> Result<AttackState> {
        let result = self.termination.start(state).await;
        self.record(&self.started, "start", &result);
        result
    }

    pub async fn stop(&self, state: &AttackState) -> Result<()> {
        let result = self.termination.stop(state).await;
        self.record(&self.stopped, "stop", &result);
        result
    }

    fn record<T>(&self, counter: &AtomicU64, step: &str, result: &Result<T>) {
        match result {
            Ok(_) => {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(step, error = %e, "Attack step failed");
            }
        }
    }

    pub fn stats(&self) -> ExtensionStats {
        ExtensionStats {
            prepared: self.prepared.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            stopped: self.stopped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discovery_cycles: self.services.cycles() + self.routes.cycles(),
        }
    }
}
