//! Cached execution of structured search requests.

use color_eyre::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::advisor::{PerformanceAdvisor, PerformanceClass};
use crate::cache::{CacheKey, ResultCache};
use crate::query::{
  CompiledQuery, FilterSpec, QueryCompiler, QueryError, QueryRequest, QueryValidator, SortSpec,
  ValidationReport,
};
use crate::tracker::{BackendQuery, QueryExecutor, SearchKey};

/// Page size used when a request does not set one.
pub const DEFAULT_LIMIT: u32 = 50;

/// Expired results are swept after this many stores.
pub const SWEEP_EVERY: u64 = 100;

/// Execution details returned with every response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
  pub total_count: usize,
  pub has_more: bool,
  pub query_time_ms: u64,
  pub cached: bool,
  pub performance_class: PerformanceClass,
  pub suggestions: Vec<String>,
  /// Validation and compilation warnings
  pub warnings: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub filters: Option<Vec<FilterSpec>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sorting: Option<Vec<SortSpec>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub compiled_query: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
  pub records: Vec<Value>,
  pub metadata: QueryMetadata,
}

/// Runs requests through validation, compilation and the backend, caching
/// successful results.
///
/// The cache is injected so several orchestrators (or tests) can share or
/// isolate it. Concurrent identical misses each reach the backend.
pub struct QueryOrchestrator<E> {
  executor: E,
  cache: Arc<ResultCache<QueryResponse>>,
  compiler: QueryCompiler,
  validator: QueryValidator,
  result_ttl: Option<u64>,
  stores: AtomicU64,
}

impl<E: QueryExecutor> QueryOrchestrator<E> {
  pub fn new(executor: E, cache: Arc<ResultCache<QueryResponse>>) -> Self {
    Self {
      executor,
      cache,
      compiler: QueryCompiler::new(),
      validator: QueryValidator::new(),
      result_ttl: None,
      stores: AtomicU64::new(0),
    }
  }

  /// Replace the compiler. The validator follows its scope field so the
  /// unscoped warning names the field the compiler actually scopes on.
  pub fn with_compiler(mut self, compiler: QueryCompiler) -> Self {
    self.validator = self.validator.with_scope_field(compiler.scope_field());
    self.compiler = compiler;
    self
  }

  /// Replace the validator. Call after `with_compiler` to keep a different
  /// scope field.
  pub fn with_validator(mut self, validator: QueryValidator) -> Self {
    self.validator = validator;
    self
  }

  /// TTL for stored results. `None` uses the cache's `query` domain TTL.
  pub fn with_result_ttl(mut self, ttl_secs: Option<u64>) -> Self {
    self.result_ttl = ttl_secs;
    self
  }

  pub fn cache(&self) -> &Arc<ResultCache<QueryResponse>> {
    &self.cache
  }

  pub fn validate(&self, request: &QueryRequest) -> ValidationReport {
    self.validator.validate(request)
  }

  pub fn compile(&self, request: &QueryRequest) -> Result<CompiledQuery, QueryError> {
    self.compiler.compile(request)
  }

  /// Drop every cached search result, e.g. after a write to the tracker.
  pub fn invalidate(&self) -> usize {
    self.cache.delete_pattern(SearchKey::prefix())
  }

  /// Execute a request, serving it from cache when possible.
  ///
  /// Validation errors and compile errors fail before the backend is
  /// contacted. Backend errors are returned unchanged and nothing is cached.
  pub async fn execute(&self, request: &QueryRequest) -> Result<QueryResponse> {
    let key = SearchKey::new(request);
    let cache_key = key.cache_key();

    if let Some(entry) = self.cache.get(&cache_key) {
      debug!(query = %key.description(), "serving search from cache");
      let mut response = entry.payload;
      response.metadata.cached = true;
      return Ok(response);
    }

    let report = self.validator.validate(request);
    if !report.valid {
      return Err(QueryError::Validation(report.errors).into());
    }
    for warning in &report.warnings {
      warn!(query = %key.description(), "{}", warning);
    }

    let compiled = self.compiler.compile(request)?;
    let limit = request.pagination.limit.unwrap_or(DEFAULT_LIMIT);
    let backend_query = BackendQuery {
      query: compiled.text.clone(),
      fields: request.field_selector.clone().unwrap_or_default(),
      limit,
      offset: request.pagination.offset.unwrap_or(0),
      order_by: compiled.order_by.clone(),
    };

    let started = Instant::now();
    let records = self.executor.execute_query(&backend_query).await?;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let performance = PerformanceAdvisor::classify(elapsed_ms, records.len());
    info!(
      query = %compiled.text,
      elapsed_ms,
      count = records.len(),
      class = %performance.class,
      "search executed"
    );

    let mut warnings = report.warnings;
    warnings.extend(compiled.warnings);

    let (filters, sorting, compiled_query, order_by) = if request.include_metadata {
      (
        Some(request.filters.clone()),
        Some(request.sorting.clone()),
        Some(compiled.text),
        compiled.order_by,
      )
    } else {
      (None, None, None, None)
    };

    let response = QueryResponse {
      metadata: QueryMetadata {
        total_count: records.len(),
        has_more: limit > 0 && records.len() >= limit as usize,
        query_time_ms: elapsed_ms,
        cached: false,
        performance_class: performance.class,
        suggestions: performance.suggestions,
        warnings,
        filters,
        sorting,
        compiled_query,
        order_by,
      },
      records,
    };

    self
      .cache
      .set(cache_key, response.clone(), self.result_ttl);
    let stored = self.stores.fetch_add(1, Ordering::Relaxed) + 1;
    if stored % SWEEP_EVERY == 0 {
      self.cache.purge_expired();
    }

    Ok(response)
  }
}
