//! Typed representation of a structured search request.
//!
//! A [`FilterSpec`] pairs a field name with a [`Condition`], the operator and
//! the value shape it takes. Shapes that make no sense for an operator (a
//! `between` with three bounds, an `in` with a single scalar) are rejected when
//! the `{field, operator, value, negate}` wire form is deserialized, so the
//! compiler never has to guess.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::QueryError;

/// A single literal value in a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
  Bool(bool),
  Int(i64),
  Float(f64),
  Text(String),
}

impl fmt::Display for Scalar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Scalar::Bool(b) => write!(f, "{}", b),
      Scalar::Int(i) => write!(f, "{}", i),
      Scalar::Float(x) => write!(f, "{}", x),
      Scalar::Text(s) => f.write_str(s),
    }
  }
}

impl From<&str> for Scalar {
  fn from(s: &str) -> Self {
    Scalar::Text(s.to_string())
  }
}

impl From<String> for Scalar {
  fn from(s: String) -> Self {
    Scalar::Text(s)
  }
}

impl From<i64> for Scalar {
  fn from(i: i64) -> Self {
    Scalar::Int(i)
  }
}

impl From<f64> for Scalar {
  fn from(x: f64) -> Self {
    Scalar::Float(x)
  }
}

impl From<bool> for Scalar {
  fn from(b: bool) -> Self {
    Scalar::Bool(b)
  }
}

/// Comparison kinds a filter can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
  Equals,
  Contains,
  StartsWith,
  EndsWith,
  In,
  NotIn,
  Greater,
  Less,
  Between,
  IsEmpty,
  IsNotEmpty,
}

impl Operator {
  pub fn as_str(&self) -> &'static str {
    match self {
      Operator::Equals => "equals",
      Operator::Contains => "contains",
      Operator::StartsWith => "startsWith",
      Operator::EndsWith => "endsWith",
      Operator::In => "in",
      Operator::NotIn => "notIn",
      Operator::Greater => "greater",
      Operator::Less => "less",
      Operator::Between => "between",
      Operator::IsEmpty => "isEmpty",
      Operator::IsNotEmpty => "isNotEmpty",
    }
  }
}

impl fmt::Display for Operator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An operator together with the value shape it requires.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
  Equals(Scalar),
  /// Rendered like `Equals`; the backend already matches substrings.
  Contains(Scalar),
  StartsWith(Scalar),
  EndsWith(Scalar),
  In(Vec<Scalar>),
  NotIn(Vec<Scalar>),
  Greater(Scalar),
  Less(Scalar),
  Between(Scalar, Scalar),
  IsEmpty,
  IsNotEmpty,
}

impl Condition {
  pub fn operator(&self) -> Operator {
    match self {
      Condition::Equals(_) => Operator::Equals,
      Condition::Contains(_) => Operator::Contains,
      Condition::StartsWith(_) => Operator::StartsWith,
      Condition::EndsWith(_) => Operator::EndsWith,
      Condition::In(_) => Operator::In,
      Condition::NotIn(_) => Operator::NotIn,
      Condition::Greater(_) => Operator::Greater,
      Condition::Less(_) => Operator::Less,
      Condition::Between(_, _) => Operator::Between,
      Condition::IsEmpty => Operator::IsEmpty,
      Condition::IsNotEmpty => Operator::IsNotEmpty,
    }
  }

  /// Build a condition from the loosely-shaped wire form.
  fn from_parts(operator: Operator, value: Option<RawValue>) -> Result<Self, String> {
    let single = |value: Option<RawValue>| match value {
      Some(RawValue::One(v)) => Ok(v),
      Some(RawValue::List(_)) => Err(format!("operator `{}` takes a single value", operator)),
      None => Err(format!("operator `{}` requires a value", operator)),
    };
    let list = |value: Option<RawValue>| match value {
      Some(RawValue::List(values)) => Ok(values),
      Some(RawValue::One(_)) => Err(format!("operator `{}` requires a list value", operator)),
      None => Err(format!("operator `{}` requires a value", operator)),
    };

    let condition = match operator {
      Operator::Equals => Condition::Equals(single(value)?),
      Operator::Contains => Condition::Contains(single(value)?),
      Operator::StartsWith => Condition::StartsWith(single(value)?),
      Operator::EndsWith => Condition::EndsWith(single(value)?),
      Operator::Greater => Condition::Greater(single(value)?),
      Operator::Less => Condition::Less(single(value)?),
      Operator::In => Condition::In(list(value)?),
      Operator::NotIn => Condition::NotIn(list(value)?),
      Operator::Between => {
        let bounds = list(value)?;
        let count = bounds.len();
        let mut bounds = bounds.into_iter();
        match (bounds.next(), bounds.next(), bounds.next()) {
          (Some(lo), Some(hi), None) => Condition::Between(lo, hi),
          _ => {
            return Err(format!(
              "operator `between` requires exactly 2 values, got {}",
              count
            ))
          }
        }
      }
      Operator::IsEmpty => Condition::IsEmpty,
      Operator::IsNotEmpty => Condition::IsNotEmpty,
    };
    Ok(condition)
  }

  fn into_raw(self) -> Option<RawValue> {
    match self {
      Condition::Equals(v)
      | Condition::Contains(v)
      | Condition::StartsWith(v)
      | Condition::EndsWith(v)
      | Condition::Greater(v)
      | Condition::Less(v) => Some(RawValue::One(v)),
      Condition::In(values) | Condition::NotIn(values) => Some(RawValue::List(values)),
      Condition::Between(lo, hi) => Some(RawValue::List(vec![lo, hi])),
      Condition::IsEmpty | Condition::IsNotEmpty => None,
    }
  }
}

/// One comparison against a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFilter", into = "RawFilter")]
pub struct FilterSpec {
  pub field: String,
  pub condition: Condition,
  pub negate: bool,
}

impl FilterSpec {
  pub fn new(field: impl Into<String>, condition: Condition) -> Self {
    Self {
      field: field.into(),
      condition,
      negate: false,
    }
  }

  pub fn equals(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
    Self::new(field, Condition::Equals(value.into()))
  }

  pub fn one_of<V: Into<Scalar>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
    Self::new(
      field,
      Condition::In(values.into_iter().map(Into::into).collect()),
    )
  }

  pub fn between(
    field: impl Into<String>,
    lo: impl Into<Scalar>,
    hi: impl Into<Scalar>,
  ) -> Self {
    Self::new(field, Condition::Between(lo.into(), hi.into()))
  }

  /// Return this filter with negation switched on.
  pub fn negated(mut self) -> Self {
    self.negate = true;
    self
  }

  pub fn operator(&self) -> Operator {
    self.condition.operator()
  }
}

/// Wire form of a filter: `{ field, operator, value?, negate? }`.
#[derive(Serialize, Deserialize)]
struct RawFilter {
  #[serde(default)]
  field: String,
  operator: Operator,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  value: Option<RawValue>,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  negate: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawValue {
  List(Vec<Scalar>),
  One(Scalar),
}

impl TryFrom<RawFilter> for FilterSpec {
  type Error = QueryError;

  fn try_from(raw: RawFilter) -> Result<Self, Self::Error> {
    let condition =
      Condition::from_parts(raw.operator, raw.value).map_err(|reason| QueryError::Shape {
        field: raw.field.clone(),
        reason,
      })?;
    Ok(Self {
      field: raw.field,
      condition,
      negate: raw.negate,
    })
  }
}

impl From<FilterSpec> for RawFilter {
  fn from(filter: FilterSpec) -> Self {
    let operator = filter.condition.operator();
    Self {
      field: filter.field,
      operator,
      value: filter.condition.into_raw(),
      negate: filter.negate,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  #[default]
  Asc,
  Desc,
}

impl SortDirection {
  pub fn as_str(&self) -> &'static str {
    match self {
      SortDirection::Asc => "asc",
      SortDirection::Desc => "desc",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
  pub field: String,
  #[serde(default)]
  pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub offset: Option<u32>,
}

/// A complete structured search request.
///
/// Built once per call and treated as immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub scope_id: Option<String>,
  pub filters: Vec<FilterSpec>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub text_search: Option<String>,
  pub sorting: Vec<SortSpec>,
  pub pagination: Pagination,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field_selector: Option<Vec<String>>,
  pub include_metadata: bool,
}

impl Default for QueryRequest {
  fn default() -> Self {
    Self {
      scope_id: None,
      filters: Vec::new(),
      text_search: None,
      sorting: Vec::new(),
      pagination: Pagination::default(),
      field_selector: None,
      include_metadata: true,
    }
  }
}

impl QueryRequest {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
    self.scope_id = Some(scope.into());
    self
  }

  pub fn filter(mut self, filter: FilterSpec) -> Self {
    self.filters.push(filter);
    self
  }

  pub fn text(mut self, text: impl Into<String>) -> Self {
    self.text_search = Some(text.into());
    self
  }

  pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
    self.sorting.push(SortSpec {
      field: field.into(),
      direction,
    });
    self
  }

  pub fn limit(mut self, limit: u32) -> Self {
    self.pagination.limit = Some(limit);
    self
  }

  pub fn offset(mut self, offset: u32) -> Self {
    self.pagination.offset = Some(offset);
    self
  }

  pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
    self.field_selector = Some(fields.into_iter().map(Into::into).collect());
    self
  }

  pub fn without_metadata(mut self) -> Self {
    self.include_metadata = false;
    self
  }
}
