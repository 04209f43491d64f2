//! The single capability the query pipeline needs from a tracker backend.

use async_trait::async_trait;
use color_eyre::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// A compiled query as handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendQuery {
  pub query: String,
  /// Fields to return for each record; empty means backend defaults
  pub fields: Vec<String>,
  pub limit: u32,
  pub offset: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order_by: Option<String>,
}

/// Executes query text against a tracker and returns its records.
///
/// Transport, authentication and retries belong to implementors; callers
/// only see records or an error.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
  async fn execute_query(&self, query: &BackendQuery) -> Result<Vec<Value>>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
  async fn execute_query(&self, query: &BackendQuery) -> Result<Vec<Value>> {
    (**self).execute_query(query).await
  }
}
