use thiserror::Error;

use super::filter::Operator;

/// Failures raised before a query ever reaches the backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
  /// The wire form of a filter has a value shape its operator cannot take.
  #[error("invalid filter on `{field}`: {reason}")]
  Shape { field: String, reason: String },

  /// The validator found structural problems; each entry names the filter.
  #[error("invalid query request: {}", .0.join("; "))]
  Validation(Vec<String>),

  /// A filter cannot be expressed in the backend grammar without changing
  /// its meaning.
  #[error("cannot compile `{field}` {operator} {value}: {reason}")]
  Compile {
    field: String,
    operator: Operator,
    value: String,
    reason: String,
  },
}
