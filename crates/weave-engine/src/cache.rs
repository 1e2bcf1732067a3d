//! Composition result cache.
//!
//! Keyed by a fingerprint over every composition input, so invalidation is
//! structural: edit a module or re-discover a server and the key moves.
//! Identical concurrent requests collapse onto one compute.

use std::collections::HashMap;

use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use weave_core::request::CompositionRequest;
use weave_core::types::CompositionResult;

use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};

/// Default entry cap; past it the least recently used entry is evicted.
pub const DEFAULT_MAX_ENTRIES: usize = 128;

/// What one lookup found under the lock.
enum Claim {
    Hit(CompositionResult),
    Wait(watch::Receiver<bool>),
    Lead(watch::Sender<bool>),
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CompositionResult>,
    // Front = least recently used.
    access_order: Vec<String>,
    in_flight: HashMap<String, watch::Receiver<bool>>,
    hits: u64,
    misses: u64,
}

/// LRU result cache with single-flight computes.
pub struct ResultCache {
    max_entries: usize,
    inner: Mutex<CacheInner>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    /// Cache with the default entry cap.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Cache holding at most `max_entries` results.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Return the cached result for `key`, or run `compute` and cache it.
    ///
    /// Concurrent callers with the same key wait for the first compute
    /// instead of repeating it. Cached results come back with `cache_hit`
    /// set; a fresh compute reports false.
    pub async fn get_or_compute<F>(&self, key: &str, compute: F) -> CompositionResult
    where
        F: FnOnce() -> CompositionResult,
    {
        let lead = loop {
            match self.claim(key) {
                Claim::Hit(result) => {
                    counter!(CACHE_HITS_TOTAL).increment(1);
                    return result;
                }
                Claim::Wait(mut rx) => {
                    if rx.wait_for(|done| *done).await.is_err() {
                        // The leader vanished without installing; drop the
                        // dead claim so a later caller can lead.
                        self.clear_dead_claim(key);
                    }
                }
                Claim::Lead(tx) => break tx,
            }
        };

        counter!(CACHE_MISSES_TOTAL).increment(1);
        let result = compute();
        self.install(key, result.clone());
        let _ = lead.send(true);
        result
    }

    /// Occupancy and effectiveness counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let total = inner.hits + inner.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            inner.hits as f64 / total as f64
        };
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            hit_rate,
        }
    }

    fn claim(&self, key: &str) -> Claim {
        let mut inner = self.inner.lock();
        if let Some(cached) = inner.entries.get(key) {
            let mut result = cached.clone();
            result.cache_hit = true;
            inner.hits += 1;
            touch(&mut inner.access_order, key);
            return Claim::Hit(result);
        }
        if let Some(rx) = inner.in_flight.get(key) {
            return Claim::Wait(rx.clone());
        }
        let (tx, rx) = watch::channel(false);
        let _ = inner.in_flight.insert(key.to_string(), rx);
        inner.misses += 1;
        Claim::Lead(tx)
    }

    fn clear_dead_claim(&self, key: &str) {
        let mut inner = self.inner.lock();
        let dead = inner
            .in_flight
            .get(key)
            .is_some_and(|rx| rx.has_changed().is_err());
        if dead {
            let _ = inner.in_flight.remove(key);
        }
    }

    fn install(&self, key: &str, result: CompositionResult) {
        let mut inner = self.inner.lock();
        let _ = inner.in_flight.remove(key);
        if inner.entries.insert(key.to_string(), result).is_none() {
            inner.access_order.push(key.to_string());
        } else {
            touch(&mut inner.access_order, key);
        }
        while inner.entries.len() > self.max_entries && !inner.access_order.is_empty() {
            let oldest = inner.access_order.remove(0);
            let _ = inner.entries.remove(&oldest);
        }
    }
}

fn touch(order: &mut Vec<String>, key: &str) {
    if let Some(position) = order.iter().position(|entry| entry == key) {
        let entry = order.remove(position);
        order.push(entry);
    }
}

/// Cache counters as reported by status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    /// Live cached results.
    pub entries: usize,
    /// Lookups served from cache.
    pub hits: u64,
    /// Lookups that had to compute.
    pub misses: u64,
    /// hits / (hits + misses); 0 before the first lookup.
    #[serde(rename = "hitRate")]
    pub hit_rate: f64,
}

/// Deterministic key over every input that can change a composition.
///
/// Covers the request fields, the repository content hash, and the registry
/// view version, so a module edit or a tool re-discovery moves the key and
/// stale entries are simply never addressed again.
pub fn fingerprint(
    request: &CompositionRequest,
    content_hash: &str,
    registry_version: u64,
) -> String {
    let mut hasher = Sha256::new();
    hash_part(&mut hasher, &request.user_prompt);
    for (key, server) in &request.mcp_config.servers {
        hash_part(&mut hasher, key);
        hash_part(&mut hasher, &server.name);
        hash_part(&mut hasher, &server.command);
        for arg in &server.args {
            hash_part(&mut hasher, arg);
        }
        hasher.update([1u8]);
    }
    hash_part(
        &mut hasher,
        &serde_json::to_string(&request.session_state).unwrap_or_default(),
    );
    for hint in &request.domain_hints {
        hash_part(&mut hasher, hint);
    }
    hasher.update([1u8]);
    for hint in &request.behavior_hints {
        hash_part(&mut hasher, hint);
    }
    hasher.update([1u8]);
    if let Some(tier) = request.task_complexity {
        hash_part(&mut hasher, tier.as_str());
    }
    hasher.update([1u8]);
    hash_part(&mut hasher, content_hash);
    hasher.update(registry_version.to_be_bytes());
    format!("{:x}", hasher.finalize())
}

// Parts are NUL-terminated so adjacent fields cannot collide.
fn hash_part(hasher: &mut Sha256, part: &str) {
    hasher.update(part.as_bytes());
    hasher.update([0u8]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use weave_core::types::ComplexityTier;

    fn result(prompt: &str) -> CompositionResult {
        CompositionResult {
            system_prompt: prompt.to_string(),
            modules_used: Vec::new(),
            complexity: ComplexityTier::Low,
            cache_hit: false,
        }
    }

    fn request(prompt: &str) -> CompositionRequest {
        CompositionRequest {
            user_prompt: prompt.to_string(),
            ..CompositionRequest::default()
        }
    }

    #[tokio::test]
    async fn second_lookup_is_a_hit() {
        let cache = ResultCache::new();
        let first = cache.get_or_compute("k", || result("p")).await;
        assert!(!first.cache_hit);

        let second = cache
            .get_or_compute("k", || panic!("must not recompute"))
            .await;
        assert!(second.cache_hit);
        assert_eq!(second.system_prompt, "p");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_collide() {
        let cache = ResultCache::new();
        let _ = cache.get_or_compute("a", || result("a")).await;
        let b = cache.get_or_compute("b", || result("b")).await;
        assert!(!b.cache_hit);
        assert_eq!(cache.stats().entries, 2);
    }

    #[tokio::test]
    async fn eviction_drops_least_recently_used() {
        let cache = ResultCache::with_capacity(2);
        let _ = cache.get_or_compute("a", || result("a")).await;
        let _ = cache.get_or_compute("b", || result("b")).await;
        // Touch "a" so "b" is now the eviction candidate.
        let _ = cache.get_or_compute("a", || panic!("cached")).await;
        let _ = cache.get_or_compute("c", || result("c")).await;

        let a = cache.get_or_compute("a", || panic!("cached")).await;
        assert!(a.cache_hit);
        let b = cache.get_or_compute("b", || result("recomputed")).await;
        assert!(!b.cache_hit, "evicted entry must recompute");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_lookups_compute_once() {
        let cache = Arc::new(ResultCache::new());
        let computes = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let computes = Arc::clone(&computes);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("shared", move || {
                        let _ = computes.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(30));
                        result("once")
                    })
                    .await
            }));
        }

        let mut hits = 0;
        for handle in handles {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.system_prompt, "once");
            if outcome.cache_hit {
                hits += 1;
            }
        }
        assert_eq!(computes.load(Ordering::SeqCst), 1);
        assert_eq!(hits, 7);
    }

    #[test]
    fn fingerprint_tracks_every_input() {
        let base = fingerprint(&request("fix"), "hash", 1);
        assert_eq!(fingerprint(&request("fix"), "hash", 1), base);

        assert_ne!(fingerprint(&request("other"), "hash", 1), base);
        assert_ne!(fingerprint(&request("fix"), "hash2", 1), base);
        assert_ne!(fingerprint(&request("fix"), "hash", 2), base);

        let mut hinted = request("fix");
        hinted.domain_hints.push("filesystem".into());
        assert_ne!(fingerprint(&hinted, "hash", 1), base);

        let mut overridden = request("fix");
        overridden.task_complexity = Some(ComplexityTier::High);
        assert_ne!(fingerprint(&overridden, "hash", 1), base);
    }

    #[test]
    fn fingerprint_separates_hint_kinds() {
        let mut domain = request("x");
        domain.domain_hints.push("planning".into());
        let mut behavior = request("x");
        behavior.behavior_hints.push("planning".into());
        assert_ne!(
            fingerprint(&domain, "h", 0),
            fingerprint(&behavior, "h", 0)
        );
    }

    #[test]
    fn fingerprint_covers_session_state_and_servers() {
        let plain = fingerprint(&request("x"), "h", 0);

        let mut with_state = request("x");
        with_state
            .session_state
            .insert("tool_call_count", serde_json::json!(3));
        assert_ne!(fingerprint(&with_state, "h", 0), plain);

        let mut with_server = request("x");
        let _ = with_server.mcp_config.servers.insert(
            "files".into(),
            weave_core::request::McpServerConfig {
                name: "files".into(),
                command: "files-server".into(),
                args: vec!["--stdio".into()],
            },
        );
        assert_ne!(fingerprint(&with_server, "h", 0), plain);
    }
}
