//! Response caching for the data-access layer.
//!
//! This module provides a request-keyed cache that:
//! - Stores normalized GET payloads keyed by method, URL and body digest
//! - Treats entries older than the TTL (5 minutes by default) as misses
//! - Invalidates by endpoint prefix after mutations
//! - Lives in memory only, owned by whoever builds the dispatcher

mod key;
mod layer;

pub use key::{has_path_prefix, CacheKey};
pub use layer::{is_fresh, ResponseCache, DEFAULT_TTL};
