//! In-memory TTL cache with insertion-order eviction.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use futures::future::{join_all, BoxFuture};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::stats::{CacheHealth, CacheStats};
use super::ttl::TtlPolicy;

pub const DEFAULT_MAX_SIZE: usize = 1000;

/// A single cached value.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  pub key: String,
  pub payload: V,
  pub created_at: DateTime<Utc>,
  pub ttl_secs: u64,
  /// Number of `get` calls served by this entry since it was last written
  pub hit_count: u64,
  stored_at: Instant,
  slot: u64,
}

impl<V> CacheEntry<V> {
  pub fn age(&self) -> Duration {
    self.stored_at.elapsed()
  }

  pub fn is_expired(&self) -> bool {
    self.age() > Duration::from_secs(self.ttl_secs)
  }
}

#[derive(Debug, Default)]
struct Counters {
  hits: u64,
  misses: u64,
  sets: u64,
  deletes: u64,
  evictions: u64,
  expirations: u64,
}

struct CacheState<V> {
  entries: HashMap<String, CacheEntry<V>>,
  /// Insertion slot -> key, oldest first
  order: BTreeMap<u64, String>,
  next_slot: u64,
  counters: Counters,
}

impl<V> CacheState<V> {
  fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
    let entry = self.entries.remove(key)?;
    self.order.remove(&entry.slot);
    Some(entry)
  }

  fn evict_oldest(&mut self) -> Option<String> {
    let (_, key) = self.order.pop_first()?;
    self.entries.remove(&key);
    self.counters.evictions += 1;
    Some(key)
  }
}

/// A fetch to run for a key that is not cached yet.
pub struct WarmUpItem<V> {
  pub key: String,
  pub ttl_secs: Option<u64>,
  fetch: BoxFuture<'static, Result<V>>,
}

impl<V> WarmUpItem<V> {
  pub fn new<F>(key: impl Into<String>, fetch: F) -> Self
  where
    F: Future<Output = Result<V>> + Send + 'static,
  {
    Self {
      key: key.into(),
      ttl_secs: None,
      fetch: Box::pin(fetch),
    }
  }

  pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
    self.ttl_secs = Some(ttl_secs);
    self
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmUpReport {
  pub loaded: Vec<String>,
  pub skipped: Vec<String>,
  /// Keys whose fetch failed, with the error message
  pub failed: Vec<(String, String)>,
}

/// Generic key/value cache with per-domain TTLs.
///
/// Expired entries are dropped lazily on read and eagerly by
/// [`ResultCache::purge_expired`]. When full, the entry inserted first is
/// evicted; overwriting a key refreshes it in place without moving it.
pub struct ResultCache<V> {
  state: Mutex<CacheState<V>>,
  policy: TtlPolicy,
  max_size: usize,
}

impl<V: Clone> Default for ResultCache<V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<V: Clone> ResultCache<V> {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(CacheState {
        entries: HashMap::new(),
        order: BTreeMap::new(),
        next_slot: 0,
        counters: Counters::default(),
      }),
      policy: TtlPolicy::default(),
      max_size: DEFAULT_MAX_SIZE,
    }
  }

  pub fn with_max_size(mut self, max_size: usize) -> Self {
    self.max_size = max_size.max(1);
    self
  }

  pub fn with_policy(mut self, policy: TtlPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Entries are plain data, so a poisoned lock still holds a usable map.
  fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// TTL a key would get without an explicit override.
  pub fn ttl_for(&self, key: &str) -> u64 {
    self.policy.ttl_for_key(key)
  }

  pub fn get(&self, key: &str) -> Option<CacheEntry<V>> {
    let mut guard = self.lock();
    let state = &mut *guard;

    let expired = match state.entries.get_mut(key) {
      Some(entry) if !entry.is_expired() => {
        entry.hit_count += 1;
        let entry = entry.clone();
        state.counters.hits += 1;
        debug!(key, hit_count = entry.hit_count, "cache hit");
        return Some(entry);
      }
      Some(_) => true,
      None => false,
    };

    if expired {
      state.remove(key);
      state.counters.expirations += 1;
    }
    state.counters.misses += 1;
    debug!(key, expired, "cache miss");
    None
  }

  /// Store a value, returning the TTL it was given.
  ///
  /// An explicit non-zero `ttl_secs` wins; otherwise the key's domain decides.
  pub fn set(&self, key: impl Into<String>, payload: V, ttl_secs: Option<u64>) -> u64 {
    let key = key.into();
    let ttl_secs = ttl_secs
      .filter(|ttl| *ttl > 0)
      .unwrap_or_else(|| self.policy.ttl_for_key(&key));

    let mut state = self.lock();
    state.counters.sets += 1;

    if let Some(entry) = state.entries.get_mut(&key) {
      entry.payload = payload;
      entry.created_at = Utc::now();
      entry.stored_at = Instant::now();
      entry.ttl_secs = ttl_secs;
      entry.hit_count = 0;
      debug!(key = %key, ttl_secs, "cache refresh");
      return ttl_secs;
    }

    if state.entries.len() >= self.max_size {
      if let Some(evicted) = state.evict_oldest() {
        debug!(key = %evicted, "cache evict");
      }
    }

    let slot = state.next_slot;
    state.next_slot += 1;
    state.order.insert(slot, key.clone());
    state.entries.insert(
      key.clone(),
      CacheEntry {
        key: key.clone(),
        payload,
        created_at: Utc::now(),
        ttl_secs,
        hit_count: 0,
        stored_at: Instant::now(),
        slot,
      },
    );
    debug!(key = %key, ttl_secs, "cache set");
    ttl_secs
  }

  /// Whether an unexpired entry exists. Does not count as a lookup.
  pub fn has(&self, key: &str) -> bool {
    let mut state = self.lock();
    match state.entries.get(key).map(CacheEntry::is_expired) {
      Some(false) => true,
      Some(true) => {
        state.remove(key);
        state.counters.expirations += 1;
        false
      }
      None => false,
    }
  }

  pub fn delete(&self, key: &str) -> bool {
    let mut state = self.lock();
    let removed = state.remove(key).is_some();
    if removed {
      state.counters.deletes += 1;
    }
    removed
  }

  /// Remove every key containing `pattern`. Returns how many were removed.
  pub fn delete_pattern(&self, pattern: &str) -> usize {
    let mut state = self.lock();
    let keys: Vec<String> = state
      .entries
      .keys()
      .filter(|key| key.contains(pattern))
      .cloned()
      .collect();

    for key in &keys {
      state.remove(key);
    }
    state.counters.deletes += keys.len() as u64;
    debug!(pattern, removed = keys.len(), "cache invalidate");
    keys.len()
  }

  /// Drop all entries. Counters are kept.
  pub fn clear(&self) {
    let mut state = self.lock();
    state.entries.clear();
    state.order.clear();
  }

  /// Remove every expired entry. Returns how many were removed.
  pub fn purge_expired(&self) -> usize {
    let mut state = self.lock();
    let expired: Vec<String> = state
      .entries
      .values()
      .filter(|entry| entry.is_expired())
      .map(|entry| entry.key.clone())
      .collect();

    for key in &expired {
      state.remove(key);
    }
    state.counters.expirations += expired.len() as u64;
    if !expired.is_empty() {
      debug!(removed = expired.len(), "cache sweep");
    }
    expired.len()
  }

  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn stats(&self) -> CacheStats {
    let state = self.lock();
    let c = &state.counters;
    let lookups = c.hits + c.misses;
    CacheStats {
      hits: c.hits,
      misses: c.misses,
      sets: c.sets,
      deletes: c.deletes,
      evictions: c.evictions,
      expirations: c.expirations,
      size: state.entries.len(),
      max_size: self.max_size,
      hit_rate: if lookups == 0 {
        0.0
      } else {
        c.hits as f64 / lookups as f64
      },
    }
  }

  pub fn health_metrics(&self) -> CacheHealth {
    self.stats().health()
  }
}

impl<V: Clone + Send> ResultCache<V> {
  /// Populate keys that are not cached yet.
  ///
  /// Fetches run concurrently; a failed fetch is recorded in the report and
  /// does not affect the others.
  pub async fn warm_up(&self, items: impl IntoIterator<Item = WarmUpItem<V>>) -> WarmUpReport {
    let mut report = WarmUpReport::default();
    let mut pending = Vec::new();

    for item in items {
      if self.has(&item.key) {
        report.skipped.push(item.key);
      } else {
        pending.push(item);
      }
    }

    let results = join_all(pending.into_iter().map(|item| async move {
      let result = item.fetch.await;
      (item.key, item.ttl_secs, result)
    }))
    .await;

    for (key, ttl_secs, result) in results {
      match result {
        Ok(payload) => {
          self.set(key.clone(), payload, ttl_secs);
          report.loaded.push(key);
        }
        Err(e) => {
          warn!(key = %key, error = %e, "cache warm-up fetch failed");
          report.failed.push((key, e.to_string()));
        }
      }
    }

    report
  }
}
