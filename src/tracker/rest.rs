use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::{BackendConfig, Config};

use super::executor::{BackendQuery, QueryExecutor};

/// Fields requested when neither the request nor the config names any.
pub const DEFAULT_FIELDS: &[&str] = &[
  "id",
  "idReadable",
  "summary",
  "created",
  "updated",
  "resolved",
  "project(shortName)",
  "customFields(name,value(name))",
];

/// REST client for the tracker's issue search endpoint.
#[derive(Clone)]
pub struct RestExecutor {
  http: reqwest::Client,
  base_url: Url,
  token: String,
  default_fields: Vec<String>,
}

impl RestExecutor {
  /// Create an executor authenticated with the token from the environment.
  pub fn new(config: &BackendConfig) -> Result<Self> {
    let token = Config::get_api_token()?;
    Self::with_token(config, token)
  }

  pub fn with_token(config: &BackendConfig, token: String) -> Result<Self> {
    // Keep any path prefix when joining endpoint paths
    let base = format!("{}/", config.url.trim_end_matches('/'));
    let base_url =
      Url::parse(&base).map_err(|e| eyre!("Invalid backend URL {}: {}", config.url, e))?;

    let http = reqwest::Client::builder()
      .user_agent(concat!("trackq/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let default_fields = if config.fields.is_empty() {
      DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
    } else {
      config.fields.clone()
    };

    Ok(Self {
      http,
      base_url,
      token,
      default_fields,
    })
  }

  /// Build the search URL for a query.
  ///
  /// Ordering travels inside the query text as a `sort by:` clause.
  pub fn request_url(&self, query: &BackendQuery) -> Result<Url> {
    let mut url = self
      .base_url
      .join("api/issues")
      .map_err(|e| eyre!("Failed to build issues URL: {}", e))?;

    let text = match &query.order_by {
      Some(order) if query.query.is_empty() => format!("sort by: {}", order),
      Some(order) => format!("{} sort by: {}", query.query, order),
      None => query.query.clone(),
    };
    let fields = if query.fields.is_empty() {
      self.default_fields.join(",")
    } else {
      query.fields.join(",")
    };

    url
      .query_pairs_mut()
      .append_pair("query", &text)
      .append_pair("fields", &fields)
      .append_pair("$top", &query.limit.to_string())
      .append_pair("$skip", &query.offset.to_string());

    Ok(url)
  }
}

#[async_trait]
impl QueryExecutor for RestExecutor {
  async fn execute_query(&self, query: &BackendQuery) -> Result<Vec<Value>> {
    let url = self.request_url(query)?;
    debug!(url = %url, "backend issue query");

    let response = self
      .http
      .get(url)
      .bearer_auth(&self.token)
      .header(ACCEPT, "application/json")
      .send()
      .await
      .map_err(|e| eyre!("Failed to query issues: {}", e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(eyre!(
        "Issue query failed with {}: {}",
        status,
        body.trim()
      ));
    }

    let records: Vec<Value> = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse issue list: {}", e))?;

    Ok(records)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn backend(url: &str) -> BackendConfig {
    BackendConfig {
      url: url.to_string(),
      fields: Vec::new(),
      timeout_secs: 30,
    }
  }

  fn params(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
  }

  #[test]
  fn test_request_url() {
    let executor =
      RestExecutor::with_token(&backend("https://tracker.example.com"), "t".into()).unwrap();
    let url = executor
      .request_url(&BackendQuery {
        query: "project: PROJ state: Open".to_string(),
        fields: vec!["id".to_string(), "summary".to_string()],
        limit: 25,
        offset: 50,
        order_by: Some("created desc".to_string()),
      })
      .unwrap();

    assert_eq!(url.path(), "/api/issues");
    let params = params(&url);
    assert_eq!(params["query"], "project: PROJ state: Open sort by: created desc");
    assert_eq!(params["fields"], "id,summary");
    assert_eq!(params["$top"], "25");
    assert_eq!(params["$skip"], "50");
  }

  #[test]
  fn test_request_url_keeps_path_prefix_and_default_fields() {
    let executor =
      RestExecutor::with_token(&backend("https://example.com/youtrack/"), "t".into()).unwrap();
    let url = executor
      .request_url(&BackendQuery {
        query: String::new(),
        fields: Vec::new(),
        limit: 50,
        offset: 0,
        order_by: None,
      })
      .unwrap();

    assert_eq!(url.path(), "/youtrack/api/issues");
    let params = params(&url);
    assert_eq!(params["query"], "");
    assert_eq!(params["fields"], DEFAULT_FIELDS.join(","));
  }

  #[test]
  fn test_invalid_url() {
    assert!(RestExecutor::with_token(&backend("not a url"), "t".into()).is_err());
  }
}
