//! Typed issue-tracker search: structured requests are validated, compiled to
//! the tracker's query language, executed through a pluggable backend and
//! cached in memory.

pub mod advisor;
pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod query;
pub mod tracker;

pub use advisor::{PerformanceAdvisor, PerformanceClass, PerformanceReport};
pub use cache::ResultCache;
pub use orchestrator::{QueryMetadata, QueryOrchestrator, QueryResponse};
pub use query::{CompiledQuery, FilterSpec, QueryCompiler, QueryError, QueryRequest, QueryValidator};
pub use tracker::{BackendQuery, QueryExecutor};
