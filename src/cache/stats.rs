//! Cache counters and a coarse health classification built on them.

use serde::Serialize;

/// Snapshot of cache activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
  pub hits: u64,
  pub misses: u64,
  pub sets: u64,
  pub deletes: u64,
  pub evictions: u64,
  pub expirations: u64,
  pub size: usize,
  pub max_size: usize,
  pub hit_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
  Healthy,
  Warning,
  Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHealth {
  pub status: HealthStatus,
  pub hit_rate: f64,
  pub utilization: f64,
  pub recommendations: Vec<String>,
  pub stats: CacheStats,
}

impl CacheStats {
  pub fn lookups(&self) -> u64 {
    self.hits + self.misses
  }

  /// Fraction of capacity in use.
  pub fn utilization(&self) -> f64 {
    if self.max_size == 0 {
      0.0
    } else {
      self.size as f64 / self.max_size as f64
    }
  }

  pub fn health(&self) -> CacheHealth {
    let utilization = self.utilization();
    let mut recommendations = Vec::new();

    // Nothing to judge before the first lookup
    let status = if self.lookups() == 0 {
      HealthStatus::Healthy
    } else if self.hit_rate > 0.7 {
      HealthStatus::Healthy
    } else if self.hit_rate > 0.4 {
      HealthStatus::Warning
    } else {
      HealthStatus::Poor
    };

    if self.lookups() > 0 && self.hit_rate < 0.5 {
      recommendations.push("Increase TTL for frequently requested data".to_string());
    }
    if utilization >= 0.9 || self.evictions * 4 > self.sets {
      recommendations.push("Increase cache capacity to reduce evictions".to_string());
    }
    if self.lookups() > 0 && self.hit_rate < 0.3 {
      recommendations
        .push("Review caching strategy: most lookups miss the cache".to_string());
    }

    CacheHealth {
      status,
      hit_rate: self.hit_rate,
      utilization,
      recommendations,
      stats: *self,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stats(hits: u64, misses: u64) -> CacheStats {
    let lookups = hits + misses;
    CacheStats {
      hits,
      misses,
      sets: misses,
      size: 10,
      max_size: 100,
      hit_rate: if lookups == 0 {
        0.0
      } else {
        hits as f64 / lookups as f64
      },
      ..Default::default()
    }
  }

  #[test]
  fn test_health_thresholds() {
    assert_eq!(stats(8, 2).health().status, HealthStatus::Healthy);
    assert_eq!(stats(7, 3).health().status, HealthStatus::Warning);
    assert_eq!(stats(5, 5).health().status, HealthStatus::Warning);
    assert_eq!(stats(4, 6).health().status, HealthStatus::Poor);
  }

  #[test]
  fn test_idle_cache_is_healthy() {
    let health = stats(0, 0).health();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert!(health.recommendations.is_empty());
  }

  #[test]
  fn test_recommendations() {
    let health = stats(2, 8).health();
    assert_eq!(health.recommendations.len(), 2);
    assert!(health.recommendations[0].contains("TTL"));
    assert!(health.recommendations[1].contains("strategy"));

    let full = CacheStats {
      size: 95,
      ..stats(9, 1)
    };
    let health = full.health();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.recommendations.len(), 1);
    assert!(health.recommendations[0].contains("capacity"));
  }
}
