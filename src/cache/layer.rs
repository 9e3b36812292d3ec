//! In-memory response cache with a fixed time-to-live.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::key::CacheKey;

/// How long a cached response stays valid.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
  value: Value,
  captured_at: Instant,
}

/// Whether an entry captured at `captured_at` is still valid at `now`.
pub fn is_fresh(captured_at: Instant, now: Instant, ttl: Duration) -> bool {
  now.saturating_duration_since(captured_at) < ttl
}

/// Cache of normalized GET payloads.
///
/// Clones share the same entries. Expired entries are not swept; they are
/// ignored on lookup and replaced on the next store. There is no capacity
/// bound.
#[derive(Debug, Clone)]
pub struct ResponseCache {
  entries: Arc<DashMap<CacheKey, CacheEntry>>,
  ttl: Duration,
}

impl ResponseCache {
  pub fn new() -> Self {
    Self::with_ttl(DEFAULT_TTL)
  }

  pub fn with_ttl(ttl: Duration) -> Self {
    Self {
      entries: Arc::new(DashMap::new()),
      ttl,
    }
  }

  /// Fresh value for `key`, if any.
  pub fn get(&self, key: &CacheKey) -> Option<Value> {
    let entry = self.entries.get(key)?;
    if is_fresh(entry.captured_at, Instant::now(), self.ttl) {
      debug!(%key, "cache hit");
      Some(entry.value.clone())
    } else {
      debug!(%key, "cache entry expired");
      None
    }
  }

  pub fn set(&self, key: CacheKey, value: Value) {
    debug!(%key, "cache store");
    self.entries.insert(
      key,
      CacheEntry {
        value,
        captured_at: Instant::now(),
      },
    );
  }

  /// Remove every entry whose endpoint lies under `prefix`.
  ///
  /// Returns the number of entries removed.
  pub fn delete(&self, prefix: &str) -> usize {
    let mut removed = 0;
    self.entries.retain(|key, _| {
      if key.matches_prefix(prefix) {
        removed += 1;
        false
      } else {
        true
      }
    });
    removed
  }

  pub fn clear(&self) {
    self.entries.clear();
  }

  /// Number of stored entries, fresh or not.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl Default for ResponseCache {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::Method;
  use serde_json::json;

  fn key(endpoint: &str) -> CacheKey {
    CacheKey::new(
      Method::Get,
      &format!("http://api.test{}", endpoint),
      endpoint,
      "",
    )
  }

  #[test]
  fn test_is_fresh() {
    let start = Instant::now();
    let ttl = Duration::from_secs(300);
    assert!(is_fresh(start, start, ttl));
    assert!(is_fresh(start, start + Duration::from_secs(299), ttl));
    assert!(!is_fresh(start, start + ttl, ttl));
    // A capture instant in the future still counts as fresh.
    assert!(is_fresh(start + Duration::from_secs(1), start, ttl));
  }

  #[tokio::test]
  async fn test_get_set() {
    let cache = ResponseCache::new();
    assert_eq!(cache.get(&key("/clients")), None);

    cache.set(key("/clients"), json!([{"id": "c1"}]));
    assert_eq!(cache.get(&key("/clients")), Some(json!([{"id": "c1"}])));
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_entry_expires_after_ttl() {
    let cache = ResponseCache::new();
    cache.set(key("/clients"), json!([]));

    tokio::time::advance(DEFAULT_TTL - Duration::from_secs(1)).await;
    assert!(cache.get(&key("/clients")).is_some());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(cache.get(&key("/clients")).is_none());
    // Expired entries stay until overwritten or deleted
    assert_eq!(cache.len(), 1);

    cache.set(key("/clients"), json!([{"id": "c2"}]));
    assert_eq!(cache.get(&key("/clients")), Some(json!([{"id": "c2"}])));
  }

  #[tokio::test]
  async fn test_delete_by_prefix() {
    let cache = ResponseCache::new();
    cache.set(key("/clients"), json!([]));
    cache.set(key("/clients/c1"), json!({}));
    cache.set(key("/clients_archive"), json!([]));
    cache.set(key("/workouts?client_id=c1"), json!([]));

    assert_eq!(cache.delete("/clients"), 2);
    assert!(cache.get(&key("/clients_archive")).is_some());
    assert!(cache.get(&key("/workouts?client_id=c1")).is_some());

    assert_eq!(cache.delete("/workouts"), 1);
    assert_eq!(cache.delete("/nothing"), 0);
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test]
  async fn test_clones_share_entries() {
    let cache = ResponseCache::new();
    let other = cache.clone();
    other.set(key("/clients"), json!([]));
    assert!(cache.get(&key("/clients")).is_some());

    cache.clear();
    assert!(other.is_empty());

    let separate = ResponseCache::new();
    assert!(separate.is_empty());
  }
}
