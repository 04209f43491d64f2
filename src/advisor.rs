//! Classifies how a backend query performed and suggests how to speed it up.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceClass {
  Excellent,
  Good,
  Fair,
  Slow,
}

impl PerformanceClass {
  pub fn as_str(&self) -> &'static str {
    match self {
      PerformanceClass::Excellent => "excellent",
      PerformanceClass::Good => "good",
      PerformanceClass::Fair => "fair",
      PerformanceClass::Slow => "slow",
    }
  }
}

impl fmt::Display for PerformanceClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerformanceReport {
  pub class: PerformanceClass,
  pub suggestions: Vec<String>,
}

pub struct PerformanceAdvisor;

impl PerformanceAdvisor {
  /// Classify a query by wall-clock time and result size.
  pub fn classify(elapsed_ms: u64, result_count: usize) -> PerformanceReport {
    let class = match elapsed_ms {
      0..=999 => PerformanceClass::Excellent,
      1000..=2999 => PerformanceClass::Good,
      3000..=4999 => PerformanceClass::Fair,
      _ => PerformanceClass::Slow,
    };

    let mut suggestions = Vec::new();
    if elapsed_ms > 3000 {
      suggestions.push("Narrow the filters, e.g. add a project scope or a date range".to_string());
    }
    if result_count > 500 {
      suggestions.push("Use pagination to fetch large result sets in smaller pages".to_string());
    }
    if elapsed_ms > 5000 {
      suggestions.push("Serve repeated queries from cache or run them in the background".to_string());
    }

    PerformanceReport { class, suggestions }
  }
}
