//! Process-wide inventory cache with bounded, failure-isolated refresh.
//!
//! Readers take an immutable [`RegistryView`]; refresh installs new entries
//! and bumps the version under a single write point, so a composition never
//! observes a half-applied refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::descriptor::ServerDescriptor;
use crate::discovery::{McpTransport, StdioTransport};
use crate::types::{
    DiscoveryOutcome, FailedDiscovery, RegistryUpdateResult, RegistryView, ToolInventory,
};

/// Freshness policy and discovery limits.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Age under which a cached inventory is reused without re-discovery.
    pub ttl: Duration,
    /// Per-server handshake deadline.
    pub discovery_timeout: Duration,
    /// Cap on concurrent discovery handshakes.
    pub max_concurrent: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            discovery_timeout: Duration::from_secs(10),
            max_concurrent: 4,
        }
    }
}

/// A cached inventory plus the install counter value it arrived at.
#[derive(Debug)]
struct CachedInventory {
    generation: u64,
    inventory: Arc<ToolInventory>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    version: u64,
    inventories: HashMap<String, CachedInventory>,
}

/// Cached per-server tool inventories.
pub struct ToolRegistry {
    transport: Arc<dyn McpTransport>,
    config: RegistryConfig,
    inner: RwLock<RegistryInner>,
}

impl ToolRegistry {
    /// Registry over the stdio transport.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_transport(Arc::new(StdioTransport), config)
    }

    /// Registry over a custom transport.
    pub fn with_transport(transport: Arc<dyn McpTransport>, config: RegistryConfig) -> Self {
        Self {
            transport,
            config,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Refresh inventories for the given servers.
    ///
    /// Fresh cached entries are reused unless `force` is set. Servers are
    /// discovered concurrently up to the configured cap, each under its own
    /// deadline; one timeout or failure never blocks the others. A server
    /// that fails keeps its previous inventory if it had one.
    pub async fn refresh(
        &self,
        descriptors: &[ServerDescriptor],
        force: bool,
    ) -> RegistryUpdateResult {
        let mut result = RegistryUpdateResult::default();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut tasks: JoinSet<(ServerDescriptor, DiscoveryOutcome)> = JoinSet::new();

        for descriptor in descriptors {
            if !force && self.has_fresh(&descriptor.identity_key()) {
                result.skipped_fresh.push(descriptor.name.clone());
                continue;
            }
            let transport = Arc::clone(&self.transport);
            let semaphore = Arc::clone(&semaphore);
            let deadline = self.config.discovery_timeout;
            let descriptor = descriptor.clone();
            let _ = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let outcome = discover_one(transport.as_ref(), &descriptor, deadline).await;
                (descriptor, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let Ok((descriptor, outcome)) = joined else {
                warn!("discovery task panicked");
                continue;
            };
            match outcome {
                DiscoveryOutcome::Inventory(inventory) => {
                    debug!(
                        server = %descriptor.name,
                        tools = inventory.tools.len(),
                        "installed tool inventory"
                    );
                    counter!("server_discoveries_total", "outcome" => "ok").increment(1);
                    self.install(descriptor.identity_key(), inventory);
                    result.refreshed.push(descriptor.name.clone());
                }
                DiscoveryOutcome::AbsentTimeout { after } => {
                    let reason = format!("timed out after {}s", after.as_secs());
                    record_failure(&mut result, &descriptor, reason, "timeout");
                }
                DiscoveryOutcome::AbsentError { message } => {
                    record_failure(&mut result, &descriptor, message, "error");
                }
            }
        }
        result
    }

    /// Re-discover every cached inventory whose age exceeds the TTL.
    pub async fn revalidate(&self) -> RegistryUpdateResult {
        let stale: Vec<ServerDescriptor> = {
            let inner = self.inner.read();
            inner
                .inventories
                .values()
                .filter(|cached| !cached.inventory.is_fresh(self.config.ttl))
                .map(|cached| cached.inventory.server.clone())
                .collect()
        };
        self.refresh(&stale, true).await
    }

    /// Cached inventory for one server, fresh or stale.
    pub fn inventory_for(&self, descriptor: &ServerDescriptor) -> Option<Arc<ToolInventory>> {
        self.inner
            .read()
            .inventories
            .get(&descriptor.identity_key())
            .map(|cached| Arc::clone(&cached.inventory))
    }

    /// Immutable snapshot of every inventory plus the install counter.
    pub fn view(&self) -> RegistryView {
        let inner = self.inner.read();
        let inventories = inner
            .inventories
            .iter()
            .map(|(key, cached)| (key.clone(), Arc::clone(&cached.inventory)))
            .collect();
        RegistryView::new(inner.version, inventories)
    }

    /// Snapshot restricted to the given servers.
    ///
    /// Compositions scope capability tags to the servers the request
    /// configures; inventories cached for other sessions stay invisible.
    /// The view version is the newest generation among the included
    /// inventories, so fingerprints built on it move only when one of these
    /// servers re-discovers.
    pub fn view_for(&self, descriptors: &[ServerDescriptor]) -> RegistryView {
        let inner = self.inner.read();
        let mut version = 0;
        let inventories = descriptors
            .iter()
            .filter_map(|descriptor| {
                let key = descriptor.identity_key();
                let cached = inner.inventories.get(&key)?;
                version = version.max(cached.generation);
                Some((key, Arc::clone(&cached.inventory)))
            })
            .collect();
        RegistryView::new(version, inventories)
    }

    fn has_fresh(&self, key: &str) -> bool {
        self.inner
            .read()
            .inventories
            .get(key)
            .is_some_and(|cached| cached.inventory.is_fresh(self.config.ttl))
    }

    fn install(&self, key: String, inventory: Arc<ToolInventory>) {
        let mut inner = self.inner.write();
        inner.version += 1;
        let generation = inner.version;
        let _ = inner.inventories.insert(
            key,
            CachedInventory {
                generation,
                inventory,
            },
        );
    }
}

async fn discover_one(
    transport: &dyn McpTransport,
    descriptor: &ServerDescriptor,
    deadline: Duration,
) -> DiscoveryOutcome {
    match tokio::time::timeout(deadline, transport.list_tools(descriptor)).await {
        Ok(Ok(tools)) => {
            DiscoveryOutcome::Inventory(Arc::new(ToolInventory::new(descriptor.clone(), tools)))
        }
        Ok(Err(e)) => DiscoveryOutcome::AbsentError {
            message: e.to_string(),
        },
        Err(_) => DiscoveryOutcome::AbsentTimeout { after: deadline },
    }
}

fn record_failure(
    result: &mut RegistryUpdateResult,
    descriptor: &ServerDescriptor,
    reason: String,
    outcome: &'static str,
) {
    warn!(server = %descriptor.name, reason = %reason, "tool discovery produced no inventory");
    counter!("server_discoveries_total", "outcome" => outcome).increment(1);
    result.failed.push(FailedDiscovery {
        server: descriptor.name.clone(),
        reason,
    });
}
