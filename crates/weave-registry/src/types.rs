//! Inventory, outcome, and view types.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::descriptor::ServerDescriptor;
use crate::tags;

/// One tool as reported by a server's listing response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Free-form description; many servers omit it.
    #[serde(default)]
    pub description: String,
}

/// A successfully discovered tool inventory for one server.
#[derive(Debug, Clone)]
pub struct ToolInventory {
    /// The server this inventory came from.
    pub server: ServerDescriptor,
    /// Tools the server reported, in listing order.
    pub tools: Vec<ToolDescriptor>,
    /// Capability tags inferred across all tools.
    pub tags: BTreeSet<String>,
    /// Wall-clock refresh time, reported by status.
    pub refreshed_at: DateTime<Utc>,
    discovered_at: Instant,
}

impl ToolInventory {
    /// Build an inventory, inferring tags and stamping freshness.
    pub fn new(server: ServerDescriptor, tools: Vec<ToolDescriptor>) -> Self {
        let tags = tags::inventory_tags(&tools);
        Self {
            server,
            tools,
            tags,
            refreshed_at: Utc::now(),
            discovered_at: Instant::now(),
        }
    }

    /// True while the inventory's age is under the TTL.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.discovered_at.elapsed() < ttl
    }
}

/// Result of one server's discovery attempt.
#[derive(Debug)]
pub enum DiscoveryOutcome {
    /// Discovery succeeded with this inventory.
    Inventory(Arc<ToolInventory>),
    /// The handshake was abandoned at the deadline.
    AbsentTimeout {
        /// The deadline that expired.
        after: Duration,
    },
    /// The handshake failed before the deadline.
    AbsentError {
        /// What went wrong.
        message: String,
    },
}

/// One server that produced no inventory during a refresh.
#[derive(Debug, Clone)]
pub struct FailedDiscovery {
    /// Declared server name.
    pub server: String,
    /// Human-readable failure reason.
    pub reason: String,
}

/// Aggregate result of one registry refresh.
#[derive(Debug, Clone, Default)]
pub struct RegistryUpdateResult {
    /// Servers whose inventories were re-discovered.
    pub refreshed: Vec<String>,
    /// Servers skipped because their cached inventory was still fresh.
    pub skipped_fresh: Vec<String>,
    /// Servers whose discovery timed out or failed.
    pub failed: Vec<FailedDiscovery>,
}

/// Immutable registry snapshot taken at the start of one composition.
///
/// A composition evaluates every predicate against one view; a concurrent
/// refresh installs new inventories without disturbing it.
#[derive(Debug, Clone, Default)]
pub struct RegistryView {
    version: u64,
    inventories: HashMap<String, Arc<ToolInventory>>,
}

impl RegistryView {
    /// Assemble a view from already-discovered inventories.
    pub fn new(version: u64, inventories: HashMap<String, Arc<ToolInventory>>) -> Self {
        Self {
            version,
            inventories,
        }
    }

    /// Invalidation version. For a full view this is the registry's install
    /// counter; for a scoped view, the newest generation among the included
    /// inventories, so it moves only when one of *these* servers changes.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Inventory for one server identity key.
    pub fn get(&self, identity_key: &str) -> Option<&Arc<ToolInventory>> {
        self.inventories.get(identity_key)
    }

    /// Iterate (identity key, inventory) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ToolInventory>)> {
        self.inventories.iter().map(|(key, inv)| (key.as_str(), inv))
    }

    /// Union of capability tags across every inventory in the view.
    pub fn aggregated_tags(&self) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        for inventory in self.inventories.values() {
            tags.extend(inventory.tags.iter().cloned());
        }
        tags
    }

    /// Number of servers with an inventory.
    pub fn len(&self) -> usize {
        self.inventories.len()
    }

    /// True when no server has an inventory.
    pub fn is_empty(&self) -> bool {
        self.inventories.is_empty()
    }
}
