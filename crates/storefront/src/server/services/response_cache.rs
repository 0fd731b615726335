//! TTL cache for fully-computed search responses
//!
//! Keys are the exact normalized `(query, max_results)` pair; a
//! one-character query difference is a different key on purpose. Entries
//! expire lazily: a `get` that finds a stale entry treats it as a miss and
//! drops it on the spot. Nothing sweeps the map in the background.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::server::services::vector_database::ProductMatch;

/// A fully-computed search response worth serving again
#[derive(Debug, Clone)]
pub struct CachedSearch {
  pub matches: Vec<ProductMatch>,
  pub summary: String,
}

struct CacheEntry {
  expires_at: Instant,
  value: CachedSearch,
}

/// Process-wide response cache. All mutation happens behind the internal
/// lock; callers only see `get` and `put`.
pub struct ResponseCache {
  ttl: Duration,
  capacity: usize,
  store: Mutex<HashMap<(String, usize), CacheEntry>>,
}

impl ResponseCache {
  pub fn new(ttl: Duration, capacity: usize) -> Self {
    Self { ttl, capacity, store: Mutex::new(HashMap::new()) }
  }

  /// Look up a previously computed response. Expired entries are misses and
  /// are evicted on this access.
  pub fn get(&self, query: &str, max_results: usize) -> Option<CachedSearch> {
    let key = cache_key(query, max_results);
    let mut store = self.store.lock().expect("response cache lock poisoned");

    match store.get(&key) {
      Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
      Some(_) => {
        store.remove(&key);
        None
      }
      None => None,
    }
  }

  /// Store a computed response. The whole entry lands in one insertion, so
  /// readers never observe a partial response. Last writer for a key wins.
  pub fn put(&self, query: &str, max_results: usize, value: CachedSearch) {
    let key = cache_key(query, max_results);
    let mut store = self.store.lock().expect("response cache lock poisoned");

    // Bounded capacity: drop the entry closest to expiry to make room
    if store.len() >= self.capacity && !store.contains_key(&key) {
      if let Some(oldest_key) =
        store.iter().min_by_key(|(_, entry)| entry.expires_at).map(|(k, _)| k.clone())
      {
        store.remove(&oldest_key);
      }
    }

    store.insert(key, CacheEntry { expires_at: Instant::now() + self.ttl, value });
  }

  /// Number of entries currently held, including not-yet-collected expired
  /// ones
  pub fn len(&self) -> usize {
    self.store.lock().expect("response cache lock poisoned").len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Exact-match key: trimmed, lowercased query plus the resolved result count
fn cache_key(query: &str, max_results: usize) -> (String, usize) {
  (query.trim().to_lowercase(), max_results)
}
