//! Shared engine state and the typed composition pipeline.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, info};
use weave_core::request::{CompositionRequest, McpConfig};
use weave_core::types::CompositionResult;
use weave_modules::scan::{self, RepositoryError};
use weave_modules::types::RepositorySnapshot;
use weave_registry::descriptor::ServerDescriptor;
use weave_registry::discovery::McpTransport;
use weave_registry::registry::{RegistryConfig, ToolRegistry};
use weave_registry::types::RegistryUpdateResult;

use crate::cache::{self, ResultCache};
use crate::complexity;
use crate::composer;
use crate::error::EngineError;
use crate::metrics::{COMPOSITIONS_TOTAL, MODULE_PARSE_FAILURES_TOTAL};
use crate::selector;

/// Composition engine: tool registry, result cache, and one snapshot per
/// prompts directory.
pub struct Engine {
    registry: ToolRegistry,
    cache: ResultCache,
    repositories: DashMap<PathBuf, Arc<RepositorySnapshot>>,
}

static ENGINE: LazyLock<Engine> = LazyLock::new(Engine::default);

/// The process-wide engine behind the [`crate::api`] surface.
pub fn engine() -> &'static Engine {
    &ENGINE
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Engine {
    /// Engine discovering tools over the stdio transport.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            registry: ToolRegistry::new(config),
            cache: ResultCache::new(),
            repositories: DashMap::new(),
        }
    }

    /// Engine over a custom discovery transport.
    pub fn with_transport(transport: Arc<dyn McpTransport>, config: RegistryConfig) -> Self {
        Self {
            registry: ToolRegistry::with_transport(transport, config),
            cache: ResultCache::new(),
            repositories: DashMap::new(),
        }
    }

    /// Run one composition.
    ///
    /// Loads or reuses the prompts snapshot, refreshes inventories for the
    /// request's servers (fresh ones are reused), classifies complexity
    /// unless overridden, selects modules, and renders. With `cached` set,
    /// the result is served through the fingerprinted single-flight cache.
    pub async fn compose_request(
        &self,
        request: &CompositionRequest,
        prompts_dir: &Path,
        cached: bool,
    ) -> Result<CompositionResult, EngineError> {
        let snapshot = self.snapshot_for(prompts_dir)?;
        let descriptors = ServerDescriptor::from_config(&request.mcp_config);
        let _ = self.registry.refresh(&descriptors, false).await;
        let view = self.registry.view_for(&descriptors);

        let complexity = request
            .task_complexity
            .unwrap_or_else(|| complexity::classify(&request.user_prompt));

        let compute = || {
            let selected = selector::select(snapshot.modules(), &view, request, complexity);
            let system_prompt = composer::render(&selected);
            let modules_used: Vec<String> =
                selected.iter().map(|module| module.id.clone()).collect();
            debug!(
                complexity = %complexity,
                modules = modules_used.len(),
                "composed system prompt"
            );
            counter!(COMPOSITIONS_TOTAL, "complexity" => complexity.as_str()).increment(1);
            CompositionResult {
                system_prompt,
                modules_used,
                complexity,
                cache_hit: false,
            }
        };

        if cached {
            let key = cache::fingerprint(request, snapshot.content_hash(), view.version());
            Ok(self.cache.get_or_compute(&key, compute).await)
        } else {
            Ok(compute())
        }
    }

    /// Force-refresh tool inventories for every server in the config.
    pub async fn refresh_servers(&self, config: &McpConfig) -> RegistryUpdateResult {
        let descriptors = ServerDescriptor::from_config(config);
        self.registry.refresh(&descriptors, true).await
    }

    /// Re-discover cached inventories older than the TTL.
    pub async fn revalidate_servers(&self) -> RegistryUpdateResult {
        self.registry.revalidate().await
    }

    /// Load or reuse the snapshot for a prompts directory.
    ///
    /// A cached snapshot is reused only while every candidate file's stat
    /// stamp still matches; any add, remove, or edit triggers a reload that
    /// installs a fresh snapshot.
    pub fn snapshot_for(&self, dir: &Path) -> Result<Arc<RepositorySnapshot>, RepositoryError> {
        if let Some(entry) = self.repositories.get(dir) {
            let snapshot = Arc::clone(entry.value());
            drop(entry);
            let stamps = scan::stat_stamps(dir)?;
            if stamps == snapshot.stamps() {
                return Ok(snapshot);
            }
        }

        let loaded = scan::load_repository(dir)?;
        if !loaded.errors.is_empty() {
            counter!(MODULE_PARSE_FAILURES_TOTAL).increment(loaded.errors.len() as u64);
        }
        let snapshot = Arc::new(loaded.snapshot);
        info!(
            dir = %dir.display(),
            modules = snapshot.len(),
            skipped = loaded.errors.len(),
            "loaded prompts directory"
        );
        let _ = self
            .repositories
            .insert(dir.to_path_buf(), Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Diagnostic snapshot: cache counters, registry contents, repositories.
    pub fn status(&self) -> serde_json::Value {
        let view = self.registry.view();
        let servers: serde_json::Map<String, serde_json::Value> = view
            .iter()
            .map(|(key, inventory)| {
                (
                    key.to_string(),
                    serde_json::json!({
                        "lastRefresh": inventory.refreshed_at.to_rfc3339(),
                        "tools": inventory.tools.len(),
                    }),
                )
            })
            .collect();
        let repositories: serde_json::Map<String, serde_json::Value> = self
            .repositories
            .iter()
            .map(|entry| {
                (
                    entry.key().display().to_string(),
                    serde_json::json!({
                        "modules": entry.value().len(),
                        "contentHash": entry.value().content_hash(),
                    }),
                )
            })
            .collect();
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "cache": self.cache.stats(),
            "registry": {
                "version": view.version(),
                "servers": servers,
            },
            "repositories": repositories,
        })
    }
}
