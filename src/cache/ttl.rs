//! Per-domain default time-to-live table.

use std::collections::HashMap;

/// TTL used when a key's domain has no entry in the table.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Rarely-changing directories live for up to an hour; live issue lists and
/// boards go stale within minutes.
const DOMAIN_TTLS: &[(&str, u64)] = &[
  ("users", 1800),
  ("projects", 1800),
  ("custom_fields", 3600),
  ("settings", 3600),
  ("admin", 3600),
  ("articles", 600),
  ("boards", 300),
  ("sprints", 180),
  ("issues", 120),
  ("query", 60),
];

#[derive(Debug, Clone)]
pub struct TtlPolicy {
  table: HashMap<String, u64>,
  default_ttl: u64,
}

impl Default for TtlPolicy {
  fn default() -> Self {
    Self {
      table: DOMAIN_TTLS
        .iter()
        .map(|(domain, ttl)| (domain.to_string(), *ttl))
        .collect(),
      default_ttl: DEFAULT_TTL_SECS,
    }
  }
}

impl TtlPolicy {
  pub fn new() -> Self {
    Self::default()
  }

  /// Set the TTL for one domain. Zero is raised to one second.
  pub fn with_override(mut self, domain: impl Into<String>, ttl_secs: u64) -> Self {
    self.table.insert(domain.into(), ttl_secs.max(1));
    self
  }

  pub fn with_default(mut self, ttl_secs: u64) -> Self {
    self.default_ttl = ttl_secs.max(1);
    self
  }

  pub fn ttl_for_domain(&self, domain: &str) -> u64 {
    self.table.get(domain).copied().unwrap_or(self.default_ttl)
  }

  pub fn ttl_for_key(&self, key: &str) -> u64 {
    self.ttl_for_domain(domain_of(key))
  }
}

/// First colon-delimited segment of a cache key.
pub fn domain_of(key: &str) -> &str {
  key.split(':').next().unwrap_or(key)
}
