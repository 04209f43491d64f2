//! Renders a [`QueryRequest`] into the tracker's native search syntax.
//!
//! Fragments are joined with a single space, which the backend reads as an
//! implicit AND. An empty request compiles to an empty string, matching every
//! record.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::warn;

use super::error::QueryError;
use super::filter::{Condition, FilterSpec, QueryRequest, Scalar, SortSpec};

/// Enum-like fields whose grammar forbids quoted literals.
pub const DEFAULT_EXEMPT_FIELDS: &[&str] = &["state", "status"];

/// Field that `scopeId` constrains.
pub const DEFAULT_SCOPE_FIELD: &str = "project";

/// Output of a compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledQuery {
  /// Backend query text
  pub text: String,
  /// Ordering clause, consumed separately from the query text
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order_by: Option<String>,
  /// Non-fatal adjustments made while compiling
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<String>,
}

/// A compiled filter before it is joined with its neighbours.
enum Fragment {
  Clause(String),
  /// Alternatives joined with `or`; grouped when other fragments follow.
  AnyOf(Vec<String>),
}

impl Fragment {
  fn render(self, grouped: bool) -> String {
    match self {
      Fragment::Clause(clause) => clause,
      Fragment::AnyOf(alternatives) => {
        let joined = alternatives.join(" or ");
        if grouped {
          format!("({})", joined)
        } else {
          joined
        }
      }
    }
  }
}

#[derive(Debug, Clone)]
pub struct QueryCompiler {
  exempt_fields: BTreeSet<String>,
  scope_field: String,
}

impl Default for QueryCompiler {
  fn default() -> Self {
    Self {
      exempt_fields: DEFAULT_EXEMPT_FIELDS.iter().map(|f| f.to_string()).collect(),
      scope_field: DEFAULT_SCOPE_FIELD.to_string(),
    }
  }
}

impl QueryCompiler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Replace the exempt field family. Names are matched case-insensitively.
  pub fn with_exempt_fields<S: AsRef<str>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
    self.exempt_fields = fields
      .into_iter()
      .map(|f| f.as_ref().to_lowercase())
      .collect();
    self
  }

  pub fn with_scope_field(mut self, field: impl Into<String>) -> Self {
    self.scope_field = field.into();
    self
  }

  pub fn scope_field(&self) -> &str {
    &self.scope_field
  }

  pub fn is_exempt(&self, field: &str) -> bool {
    self.exempt_fields.contains(&field.to_lowercase())
  }

  /// Compile a request into query text plus a separate ordering clause.
  ///
  /// Fails only when a filter on the exempt family cannot be rendered without
  /// changing its meaning; no clause is ever dropped silently.
  pub fn compile(&self, request: &QueryRequest) -> Result<CompiledQuery, QueryError> {
    let mut warnings = Vec::new();
    let mut fragments = Vec::new();

    if let Some(scope) = non_blank(request.scope_id.as_deref()) {
      fragments.push(Fragment::Clause(format!(
        "{}: {}",
        self.scope_field,
        escape(&Scalar::from(scope))
      )));
    }

    for filter in &request.filters {
      fragments.push(self.compile_filter(filter, &mut warnings)?);
    }

    if let Some(text) = non_blank(request.text_search.as_deref()) {
      fragments.push(Fragment::Clause(render_text(text)));
    }

    let grouped = fragments.len() > 1;
    let text = fragments
      .into_iter()
      .map(|fragment| fragment.render(grouped))
      .collect::<Vec<_>>()
      .join(" ");

    Ok(CompiledQuery {
      text,
      order_by: compile_sort(&request.sorting),
      warnings,
    })
  }

  fn compile_filter(
    &self,
    filter: &FilterSpec,
    warnings: &mut Vec<String>,
  ) -> Result<Fragment, QueryError> {
    let field = filter.field.as_str();
    let neg = if filter.negate { "-" } else { "" };

    let clause = match &filter.condition {
      Condition::Equals(value)
      | Condition::Contains(value)
      | Condition::StartsWith(value)
      | Condition::EndsWith(value) => {
        format!("{}{}: {}", neg, field, self.render_value(filter, value)?)
      }
      Condition::In(values) => return self.compile_any_of(filter, values, filter.negate, warnings),
      Condition::NotIn(values) => {
        return self.compile_any_of(filter, values, !filter.negate, warnings)
      }
      // `has: -field` matches records where the field is unset
      Condition::IsEmpty => format!("has: {}{}", if filter.negate { "" } else { "-" }, field),
      Condition::IsNotEmpty => format!("has: {}{}", neg, field),
      Condition::Greater(value) => format!("{}{}: {}..", neg, field, render_bound(value)),
      Condition::Less(value) => format!("{}{}: ..{}", neg, field, render_bound(value)),
      Condition::Between(lo, hi) => format!(
        "{}{}: {}..{}",
        neg,
        field,
        render_bound(lo),
        render_bound(hi)
      ),
    };

    Ok(Fragment::Clause(clause))
  }

  fn compile_any_of(
    &self,
    filter: &FilterSpec,
    values: &[Scalar],
    negated: bool,
    warnings: &mut Vec<String>,
  ) -> Result<Fragment, QueryError> {
    let field = filter.field.as_str();
    let neg = if negated { "-" } else { "" };

    if values.is_empty() {
      return Err(compile_error(filter, "", "at least one value is required"));
    }

    if self.is_exempt(field) {
      let (valid, rejected): (Vec<String>, Vec<String>) = values
        .iter()
        .map(Scalar::to_string)
        .partition(|v| is_bare_literal(v));

      if valid.is_empty() {
        return Err(compile_error(
          filter,
          &rejected.join(", "),
          BARE_LITERAL_REASON,
        ));
      }

      if !rejected.is_empty() {
        let message = format!(
          "dropped empty or unlistable values from `{}` filter: {:?}",
          field, rejected
        );
        warn!(field, rejected = ?rejected, "{}", message);
        warnings.push(message);
      }

      // A single remaining value collapses to the plain equality form
      return Ok(Fragment::Clause(format!(
        "{}{}: {}",
        neg,
        field,
        valid.join(",")
      )));
    }

    let rendered: Vec<String> = values.iter().map(escape).collect();
    if rendered.len() == 1 {
      return Ok(Fragment::Clause(format!("{}{}: {}", neg, field, rendered[0])));
    }

    if negated {
      // not (a or b) == (not a) and (not b)
      let clauses: Vec<String> = rendered
        .iter()
        .map(|v| format!("-{}: {}", field, v))
        .collect();
      return Ok(Fragment::Clause(clauses.join(" ")));
    }

    Ok(Fragment::AnyOf(
      rendered
        .iter()
        .map(|v| format!("{}: {}", field, v))
        .collect(),
    ))
  }

  fn render_value(&self, filter: &FilterSpec, value: &Scalar) -> Result<String, QueryError> {
    if !self.is_exempt(&filter.field) {
      return Ok(escape(value));
    }

    let raw = value.to_string();
    if !is_bare_literal(&raw) {
      return Err(compile_error(filter, &raw, BARE_LITERAL_REASON));
    }
    Ok(raw)
  }
}

/// Render the ordering clause as `field direction` pairs.
pub fn compile_sort(sorting: &[SortSpec]) -> Option<String> {
  let keys: Vec<String> = sorting
    .iter()
    .filter(|s| !s.field.trim().is_empty())
    .map(|s| format!("{} {}", s.field.trim(), s.direction.as_str()))
    .collect();

  if keys.is_empty() {
    None
  } else {
    Some(keys.join(", "))
  }
}

fn compile_error(filter: &FilterSpec, value: &str, reason: &str) -> QueryError {
  QueryError::Compile {
    field: filter.field.clone(),
    operator: filter.operator(),
    value: value.to_string(),
    reason: reason.to_string(),
  }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
  s.map(str::trim).filter(|s| !s.is_empty())
}

const BARE_LITERAL_REASON: &str = "values of this field must be non-empty without spaces or commas";

/// Exempt values are emitted raw, and a comma would split them into a list.
fn is_bare_literal(s: &str) -> bool {
  !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == ',')
}

fn needs_quotes(s: &str) -> bool {
  s.is_empty()
    || s
      .chars()
      .any(|c| c.is_whitespace() || matches!(c, ':' | '{' | '}' | '-'))
}

fn quote(s: &str) -> String {
  format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Quote values the backend would otherwise split or misread. A leading `-`
/// on a number would read as negation, so every kind goes through the check.
fn escape(value: &Scalar) -> String {
  let raw = value.to_string();
  if needs_quotes(&raw) {
    quote(&raw)
  } else {
    raw
  }
}

/// Range bounds stay bare so dates like `2025-01-01` read naturally.
fn render_bound(value: &Scalar) -> String {
  let raw = value.to_string();
  if raw.chars().any(char::is_whitespace) {
    quote(&raw)
  } else {
    raw
  }
}

/// Braces cannot be escaped inside `#{...}`, so such text becomes a quoted phrase.
fn render_text(text: &str) -> String {
  if text.contains(['{', '}']) {
    quote(text)
  } else if text.chars().any(char::is_whitespace) {
    format!("#{{{}}}", text)
  } else {
    format!("#{}", text)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::filter::SortDirection;
  use proptest::prelude::*;

  fn compile(request: &QueryRequest) -> String {
    QueryCompiler::new().compile(request).unwrap().text
  }

  #[test]
  fn test_empty_request_matches_everything() {
    let compiled = QueryCompiler::new().compile(&QueryRequest::new()).unwrap();
    assert_eq!(compiled.text, "");
    assert_eq!(compiled.order_by, None);
    assert!(compiled.warnings.is_empty());
  }

  #[test]
  fn test_equals_plain_value() {
    let request = QueryRequest::new().filter(FilterSpec::equals("assignee", "alice"));
    assert_eq!(compile(&request), "assignee: alice");
  }

  #[test]
  fn test_contains_renders_like_equals() {
    let request = QueryRequest::new().filter(FilterSpec::new(
      "summary",
      Condition::Contains("crash".into()),
    ));
    assert_eq!(compile(&request), "summary: crash");
  }

  #[test]
  fn test_special_characters_are_quoted() {
    let request = QueryRequest::new()
      .filter(FilterSpec::equals("summary", "login page"))
      .filter(FilterSpec::equals("assignee", "jean-luc"))
      .filter(FilterSpec::equals("tag", "a:b"))
      .filter(FilterSpec::equals("title", "say \"hi\" now"));
    assert_eq!(
      compile(&request),
      r#"summary: "login page" assignee: "jean-luc" tag: "a:b" title: "say \"hi\" now""#
    );
  }

  #[test]
  fn test_negated_equals() {
    let request = QueryRequest::new().filter(FilterSpec::equals("assignee", "bob").negated());
    assert_eq!(compile(&request), "-assignee: bob");
  }

  #[test]
  fn test_no_negation_marker_without_negate() {
    let request = QueryRequest::new()
      .filter(FilterSpec::equals("assignee", "bob"))
      .filter(FilterSpec::one_of("priority", ["High", "Low"]));
    assert!(!compile(&request).contains('-'));
  }

  #[test]
  fn test_in_on_regular_field_uses_or() {
    let request = QueryRequest::new().filter(FilterSpec::one_of("priority", ["High", "Critical"]));
    assert_eq!(compile(&request), "priority: High or priority: Critical");
  }

  #[test]
  fn test_in_is_grouped_next_to_other_fragments() {
    let request = QueryRequest::new()
      .with_scope("PROJ")
      .filter(FilterSpec::one_of("priority", ["High", "Critical"]));
    assert_eq!(
      compile(&request),
      "project: PROJ (priority: High or priority: Critical)"
    );
  }

  #[test]
  fn test_not_in_on_regular_field_negates_every_clause() {
    let request = QueryRequest::new().filter(FilterSpec::new(
      "priority",
      Condition::NotIn(vec!["Low".into(), "Minor".into()]),
    ));
    assert_eq!(compile(&request), "-priority: Low -priority: Minor");
  }

  #[test]
  fn test_exempt_in_joins_with_comma() {
    let request = QueryRequest::new().filter(FilterSpec::one_of("state", ["Open", "Fixed"]));
    assert_eq!(compile(&request), "state: Open,Fixed");
  }

  #[test]
  fn test_exempt_in_drops_spaced_values_with_warning() {
    let request =
      QueryRequest::new().filter(FilterSpec::one_of("state", ["Open", "In Progress"]));
    let compiled = QueryCompiler::new().compile(&request).unwrap();

    assert_eq!(compiled.text, "state: Open");
    assert_eq!(compiled.warnings.len(), 1);
    assert!(compiled.warnings[0].contains("In Progress"));
  }

  #[test]
  fn test_exempt_in_all_spaced_values_is_an_error() {
    let request = QueryRequest::new().filter(FilterSpec::one_of(
      "State",
      ["In Progress", "To Verify"],
    ));
    let err = QueryCompiler::new().compile(&request).unwrap_err();

    match &err {
      QueryError::Compile { field, operator, .. } => {
        assert_eq!(field, "State");
        assert_eq!(*operator, crate::query::Operator::In);
      }
      other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("In Progress"));
  }

  #[test]
  fn test_exempt_not_in_negates_whole_list() {
    let request = QueryRequest::new().filter(FilterSpec::new(
      "state",
      Condition::NotIn(vec!["Fixed".into(), "Verified".into()]),
    ));
    assert_eq!(compile(&request), "-state: Fixed,Verified");
  }

  #[test]
  fn test_exempt_values_are_never_quoted() {
    let request = QueryRequest::new().filter(FilterSpec::equals("state", "Won't-fix"));
    assert_eq!(compile(&request), "state: Won't-fix");
  }

  #[test]
  fn test_exempt_equals_with_space_is_an_error() {
    let request = QueryRequest::new().filter(FilterSpec::equals("status", "In Progress"));
    assert!(QueryCompiler::new().compile(&request).is_err());
  }

  #[test]
  fn test_exempt_equals_empty_value_is_an_error() {
    let request = QueryRequest::new().filter(FilterSpec::equals("state", ""));
    let err = QueryCompiler::new().compile(&request).unwrap_err();
    assert!(matches!(err, QueryError::Compile { .. }));
  }

  #[test]
  fn test_exempt_equals_with_comma_is_an_error() {
    let request = QueryRequest::new().filter(FilterSpec::equals("state", "Open,Fixed"));
    assert!(QueryCompiler::new().compile(&request).is_err());
  }

  #[test]
  fn test_exempt_in_drops_empty_and_comma_values() {
    for bad in ["", "A,B"] {
      let request = QueryRequest::new().filter(FilterSpec::one_of("state", ["Open", bad]));
      let compiled = QueryCompiler::new().compile(&request).unwrap();

      assert_eq!(compiled.text, "state: Open");
      assert_eq!(compiled.warnings.len(), 1);
    }

    let request = QueryRequest::new().filter(FilterSpec::one_of("status", ["", "A,B"]));
    assert!(QueryCompiler::new().compile(&request).is_err());
  }

  #[test]
  fn test_custom_exempt_family() {
    let compiler = QueryCompiler::new().with_exempt_fields(["Type"]);
    let request = QueryRequest::new()
      .filter(FilterSpec::equals("type", "bug-fix"))
      .filter(FilterSpec::equals("state", "won-t"));
    assert_eq!(
      compiler.compile(&request).unwrap().text,
      "type: bug-fix state: \"won-t\""
    );
  }

  #[test]
  fn test_between_dates() {
    let request =
      QueryRequest::new().filter(FilterSpec::between("created", "2025-01-01", "2025-02-01"));
    assert_eq!(compile(&request), "created: 2025-01-01..2025-02-01");
  }

  #[test]
  fn test_open_ended_ranges() {
    let request = QueryRequest::new()
      .filter(FilterSpec::new("votes", Condition::Greater(Scalar::Int(10))))
      .filter(FilterSpec::new("updated", Condition::Less("2025-03-01".into())));
    assert_eq!(compile(&request), "votes: 10.. updated: ..2025-03-01");
  }

  #[test]
  fn test_negative_numbers_are_quoted() {
    let request = QueryRequest::new()
      .filter(FilterSpec::equals("votes", Scalar::Int(-5)))
      .filter(FilterSpec::equals("estimate", Scalar::Float(-1.5)))
      .filter(FilterSpec::equals("points", Scalar::Int(3)));
    assert_eq!(compile(&request), r#"votes: "-5" estimate: "-1.5" points: 3"#);

    let request = QueryRequest::new().filter(FilterSpec::one_of("votes", [-1i64, 2]));
    assert_eq!(compile(&request), r#"votes: "-1" or votes: 2"#);
  }

  #[test]
  fn test_field_existence() {
    let request = QueryRequest::new()
      .filter(FilterSpec::new("assignee", Condition::IsEmpty))
      .filter(FilterSpec::new("due", Condition::IsNotEmpty));
    assert_eq!(compile(&request), "has: -assignee has: due");

    let request = QueryRequest::new()
      .filter(FilterSpec::new("assignee", Condition::IsEmpty).negated())
      .filter(FilterSpec::new("due", Condition::IsNotEmpty).negated());
    assert_eq!(compile(&request), "has: assignee has: -due");
  }

  #[test]
  fn test_text_search_appended() {
    let request = QueryRequest::new()
      .filter(FilterSpec::equals("assignee", "alice"))
      .text("regression");
    assert_eq!(compile(&request), "assignee: alice #regression");

    let request = QueryRequest::new().text("  login timeout ");
    assert_eq!(compile(&request), "#{login timeout}");
  }

  #[test]
  fn test_text_with_braces_is_quoted() {
    let request = QueryRequest::new().text("foo } bar");
    assert_eq!(compile(&request), r#""foo } bar""#);

    let request = QueryRequest::new().text("{x}");
    assert_eq!(compile(&request), r#""{x}""#);
  }

  #[test]
  fn test_sorting_is_separate() {
    let request = QueryRequest::new()
      .filter(FilterSpec::equals("assignee", "alice"))
      .sort_by("created", SortDirection::Desc)
      .sort_by("priority", SortDirection::Asc);
    let compiled = QueryCompiler::new().compile(&request).unwrap();

    assert_eq!(compiled.text, "assignee: alice");
    assert_eq!(
      compiled.order_by.as_deref(),
      Some("created desc, priority asc")
    );
  }

  #[test]
  fn test_compile_is_deterministic() {
    let request = QueryRequest::new()
      .with_scope("PROJ")
      .filter(FilterSpec::one_of("state", ["Open", "Submitted"]))
      .filter(FilterSpec::between("created", "2025-01-01", "2025-02-01"))
      .text("crash");
    let compiler = QueryCompiler::new();
    assert_eq!(
      compiler.compile(&request).unwrap(),
      compiler.compile(&request).unwrap()
    );
    assert_eq!(
      compiler.compile(&request).unwrap().text,
      "project: PROJ state: Open,Submitted created: 2025-01-01..2025-02-01 #crash"
    );
  }

  fn plain_field() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,12}".prop_filter("exempt fields render differently", |f| {
      !DEFAULT_EXEMPT_FIELDS.contains(&f.as_str())
    })
  }

  fn any_field() -> impl Strategy<Value = String> {
    prop_oneof![plain_field(), Just("state".to_string()), Just("status".to_string())]
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_plain_equals_renders_verbatim(
      field in plain_field(),
      value in "[A-Za-z0-9_.]{1,16}"
    ) {
      let request = QueryRequest::new().filter(FilterSpec::equals(field.as_str(), value.as_str()));
      prop_assert_eq!(compile(&request), format!("{}: {}", field, value));
    }

    #[test]
    fn test_negation_marker_only_when_negated(
      field in any_field(),
      values in prop::collection::vec("[A-Za-z0-9_]{1,10}", 1..4),
      negate in any::<bool>(),
      as_list in any::<bool>()
    ) {
      let mut filter = if as_list {
        FilterSpec::one_of(field.as_str(), values.iter().map(String::as_str))
      } else {
        FilterSpec::equals(field.as_str(), values[0].as_str())
      };
      filter.negate = negate;

      let text = compile(&QueryRequest::new().filter(filter));
      prop_assert_eq!(text.contains('-'), negate);
    }
  }
}
