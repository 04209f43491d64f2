//! Cache keys for tracker searches.

use sha2::{Digest, Sha256};

use crate::cache::CacheKey;
use crate::query::QueryRequest;

/// Cache key for a structured search, `query:search:<sha256>`.
#[derive(Debug, Clone)]
pub struct SearchKey<'a> {
  request: &'a QueryRequest,
}

impl<'a> SearchKey<'a> {
  pub fn new(request: &'a QueryRequest) -> Self {
    Self { request }
  }

  /// Prefix shared by every search key, for pattern invalidation.
  pub fn prefix() -> &'static str {
    "query:search:"
  }
}

impl CacheKey for SearchKey<'_> {
  fn domain(&self) -> &str {
    "query"
  }

  fn cache_hash(&self) -> String {
    let normalized = normalize(self.request);
    let input = serde_json::to_string(&normalized).unwrap_or_else(|_| format!("{:?}", normalized));

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("search:{}", hex::encode(hasher.finalize()))
  }

  fn description(&self) -> String {
    let scope = self.request.scope_id.as_deref().unwrap_or("*");
    format!(
      "search in {} ({} filters, {} sort keys)",
      scope,
      self.request.filters.len(),
      self.request.sorting.len()
    )
  }
}

/// Trim free-text parts so cosmetic whitespace does not split the cache.
fn normalize(request: &QueryRequest) -> QueryRequest {
  let trimmed = |s: &Option<String>| {
    s.as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(String::from)
  };

  QueryRequest {
    scope_id: trimmed(&request.scope_id),
    text_search: trimmed(&request.text_search),
    ..request.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::FilterSpec;

  #[test]
  fn test_key_shape() {
    let request = QueryRequest::new().with_scope("PROJ");
    let key = SearchKey::new(&request).cache_key();

    assert!(key.starts_with(SearchKey::prefix()));
    assert_eq!(key.len(), SearchKey::prefix().len() + 64);
  }

  #[test]
  fn test_whitespace_does_not_change_key() {
    let a = QueryRequest::new().with_scope("PROJ").text("crash");
    let b = QueryRequest::new().with_scope(" PROJ ").text("  crash ");
    assert_eq!(SearchKey::new(&a).cache_key(), SearchKey::new(&b).cache_key());
  }

  #[test]
  fn test_every_part_of_the_request_is_keyed() {
    let base = QueryRequest::new().with_scope("PROJ");
    let variants = [
      base.clone().filter(FilterSpec::equals("assignee", "alice")),
      base.clone().filter(FilterSpec::equals("assignee", "alice").negated()),
      base.clone().limit(10),
      base.clone().offset(10),
      base.clone().fields(["id"]),
      base.clone().without_metadata(),
    ];

    let base_key = SearchKey::new(&base).cache_key();
    for variant in &variants {
      assert_ne!(SearchKey::new(variant).cache_key(), base_key);
    }
  }
}
