//! Core traits for addressing cached results.

/// Something that identifies a cacheable backend call.
///
/// The full key is `domain:hash`. The domain selects the default TTL, and
/// pattern invalidation can target it with a plain substring.
pub trait CacheKey {
  /// Entity family this call reads (e.g. "issues", "users", "query")
  fn domain(&self) -> &str;

  /// Stable identity of the call within its domain.
  fn cache_hash(&self) -> String;

  /// Human-readable description for logs
  fn description(&self) -> String;

  fn cache_key(&self) -> String {
    format!("{}:{}", self.domain(), self.cache_hash())
  }
}
