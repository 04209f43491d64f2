//! In-memory result caching.
//!
//! This module provides a backend-agnostic cache that:
//! - Resolves a default TTL from the key's domain (its first `:` segment)
//! - Expires entries lazily on read and in explicit sweeps
//! - Evicts the oldest inserted entry when full
//! - Tracks hit/miss counters and derives a health classification

mod stats;
mod store;
mod traits;
mod ttl;

pub use stats::{CacheHealth, CacheStats, HealthStatus};
pub use store::{CacheEntry, ResultCache, WarmUpItem, WarmUpReport, DEFAULT_MAX_SIZE};
pub use traits::CacheKey;
pub use ttl::{domain_of, TtlPolicy, DEFAULT_TTL_SECS};
