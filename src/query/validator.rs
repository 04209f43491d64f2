//! Advisory pre-flight checks for a [`QueryRequest`].

use serde::Serialize;

use super::compiler::DEFAULT_SCOPE_FIELD;
use super::filter::{Condition, QueryRequest};

/// Page sizes above this tend to degrade backend performance.
pub const MAX_RECOMMENDED_LIMIT: u32 = 1000;

/// Outcome of validating a request. Errors block execution, warnings do not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
  pub valid: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QueryValidator {
  scope_field: String,
  max_limit: u32,
}

impl Default for QueryValidator {
  fn default() -> Self {
    Self {
      scope_field: DEFAULT_SCOPE_FIELD.to_string(),
      max_limit: MAX_RECOMMENDED_LIMIT,
    }
  }
}

impl QueryValidator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_scope_field(mut self, field: impl Into<String>) -> Self {
    self.scope_field = field.into();
    self
  }

  /// Check a request without ever failing.
  pub fn validate(&self, request: &QueryRequest) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (index, filter) in request.filters.iter().enumerate() {
      if filter.field.trim().is_empty() {
        errors.push(format!(
          "filter #{} ({}) is missing a field",
          index + 1,
          filter.operator()
        ));
      }

      match &filter.condition {
        Condition::In(values) | Condition::NotIn(values) if values.is_empty() => {
          errors.push(format!(
            "filter #{} on `{}` ({}) is missing a value",
            index + 1,
            filter.field,
            filter.operator()
          ));
        }
        _ => {}
      }
    }

    if !self.is_scoped(request) {
      warnings.push(format!(
        "no `{}` filter: unscoped queries scan every record and are slow on large instances",
        self.scope_field
      ));
    }

    if let Some(limit) = request.pagination.limit {
      if limit > self.max_limit {
        warnings.push(format!(
          "limit {} exceeds {}; large pages may degrade performance",
          limit, self.max_limit
        ));
      }
    }

    ValidationReport {
      valid: errors.is_empty(),
      errors,
      warnings,
    }
  }

  fn is_scoped(&self, request: &QueryRequest) -> bool {
    let has_scope_id = request
      .scope_id
      .as_deref()
      .is_some_and(|s| !s.trim().is_empty());

    has_scope_id
      || request
        .filters
        .iter()
        .any(|f| f.field.trim().eq_ignore_ascii_case(&self.scope_field))
  }
}
