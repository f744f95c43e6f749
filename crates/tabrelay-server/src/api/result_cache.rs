//! LRU + TTL cache of finished outcomes for `GET /result` polling.
//!
//! Entries expire after a configurable TTL (default 10 minutes). LRU
//! eviction when capacity is reached.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tabrelay_core::constants::{DEFAULT_RESULT_CACHE_SIZE, DEFAULT_RESULT_CACHE_TTL};
use tabrelay_core::{Outcome, RequestId};

/// Configuration for the result cache.
#[derive(Clone, Debug)]
pub struct ResultCacheConfig {
    /// TTL for cache entries.
    pub ttl: Duration,
    /// Maximum number of cached entries.
    pub max_entries: usize,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_RESULT_CACHE_TTL,
            max_entries: DEFAULT_RESULT_CACHE_SIZE,
        }
    }
}

struct CacheEntry {
    outcome: Outcome,
    expires_at: Instant,
}

/// Finished outcomes keyed by request id.
pub struct ResultCache {
    entries: HashMap<RequestId, CacheEntry>,
    access_order: Vec<RequestId>,
    config: ResultCacheConfig,
}

impl ResultCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: ResultCacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            access_order: Vec::new(),
            config,
        }
    }

    /// Look up an outcome, updating LRU order. `None` on miss or expiry.
    ///
    /// Polling does not consume the entry.
    pub fn get(&mut self, request_id: &str) -> Option<Outcome> {
        let expired = self
            .entries
            .get(request_id)
            .map(|entry| Instant::now() >= entry.expires_at)?;
        if expired {
            drop(self.entries.remove(request_id));
            self.access_order.retain(|k| k.as_str() != request_id);
            return None;
        }

        if let Some(pos) = self.access_order.iter().position(|k| k.as_str() == request_id) {
            let key = self.access_order.remove(pos);
            self.access_order.push(key);
        }
        self.entries.get(request_id).map(|e| e.outcome.clone())
    }

    /// Store an outcome. Evicts the least recently used entry if full.
    pub fn insert(&mut self, request_id: RequestId, outcome: Outcome) {
        self.access_order.retain(|k| k != &request_id);
        if self.entries.remove(request_id.as_str()).is_none() {
            while self.entries.len() >= self.config.max_entries.max(1) {
                self.evict_oldest();
            }
        }

        let entry = CacheEntry {
            outcome,
            expires_at: Instant::now() + self.config.ttl,
        };
        drop(self.entries.insert(request_id.clone(), entry));
        self.access_order.push(request_id);
    }

    /// Remove expired entries.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| now < e.expires_at);
        let entries = &self.entries;
        self.access_order.retain(|k| entries.contains_key(k.as_str()));
        before - self.entries.len()
    }

    /// Number of cached outcomes (including not-yet-purged expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        if self.access_order.is_empty() {
            // Out of sync; should not happen.
            self.entries.clear();
            return;
        }
        let oldest = self.access_order.remove(0);
        drop(self.entries.remove(oldest.as_str()));
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(ResultCacheConfig::default())
    }
}
