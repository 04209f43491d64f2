//! Structured search requests and their translation into backend query text.

mod compiler;
mod error;
mod filter;
mod validator;

pub use compiler::{compile_sort, CompiledQuery, QueryCompiler, DEFAULT_EXEMPT_FIELDS, DEFAULT_SCOPE_FIELD};
pub use error::QueryError;
pub use filter::{
  Condition, FilterSpec, Operator, Pagination, QueryRequest, Scalar, SortDirection, SortSpec,
};
pub use validator::{QueryValidator, ValidationReport, MAX_RECOMMENDED_LIMIT};
