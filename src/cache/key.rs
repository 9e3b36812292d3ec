//! Request identity used to key cached responses.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::api::Method;

/// Identity of a request: method, full URL and a digest of the body.
///
/// Headers are not part of the key, so two callers with different tokens
/// share an entry for the same request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  method: Method,
  url: String,
  /// Endpoint path (with query) relative to the base URL; used for
  /// prefix invalidation.
  endpoint: String,
  body_digest: String,
}

impl CacheKey {
  pub fn new(method: Method, url: &str, endpoint: &str, body: &str) -> Self {
    Self {
      method,
      url: url.to_string(),
      endpoint: endpoint.to_string(),
      body_digest: digest(body),
    }
  }

  /// Whether this key's endpoint lies under `prefix`.
  pub fn matches_prefix(&self, prefix: &str) -> bool {
    has_path_prefix(&self.endpoint, prefix)
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.body_digest.is_empty() {
      write!(f, "{} {}", self.method, self.url)
    } else {
      write!(f, "{} {} #{}", self.method, self.url, &self.body_digest[..12])
    }
  }
}

/// SHA256 of the serialized body; empty bodies get an empty digest.
fn digest(body: &str) -> String {
  if body.is_empty() {
    return String::new();
  }
  let mut hasher = Sha256::new();
  hasher.update(body.as_bytes());
  hex::encode(hasher.finalize())
}

/// Prefix match on path segment boundaries: `/clients` matches `/clients`,
/// `/clients/7` and `/clients?page=2` but not `/clients_archive`.
/// An empty prefix matches nothing.
pub fn has_path_prefix(path: &str, prefix: &str) -> bool {
  let prefix = prefix.trim_end_matches('/');
  if prefix.is_empty() {
    return false;
  }
  match path.strip_prefix(prefix) {
    Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
    None => false,
  }
}
