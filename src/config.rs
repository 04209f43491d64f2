use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cache::{ResultCache, TtlPolicy, DEFAULT_MAX_SIZE, DEFAULT_TTL_SECS};
use crate::query::{QueryCompiler, QueryValidator, DEFAULT_EXEMPT_FIELDS, DEFAULT_SCOPE_FIELD};

const LOCAL_CONFIG_FILE: &str = "trackq.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  /// Tracker connection; only needed for commands that execute queries
  pub backend: Option<BackendConfig>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub query: QueryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  pub url: String,
  /// Fields returned when a request has no field selector
  #[serde(default)]
  pub fields: Vec<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub max_size: usize,
  /// TTL for domains missing from the built-in table
  pub default_ttl_secs: u64,
  /// TTL for search results; falls back to the `query` domain entry
  pub result_ttl_secs: Option<u64>,
  /// Per-domain TTL overrides, e.g. `issues: 60`
  pub ttl: BTreeMap<String, u64>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_size: DEFAULT_MAX_SIZE,
      default_ttl_secs: DEFAULT_TTL_SECS,
      result_ttl_secs: None,
      ttl: BTreeMap::new(),
    }
  }
}

impl CacheConfig {
  pub fn ttl_policy(&self) -> TtlPolicy {
    self
      .ttl
      .iter()
      .fold(TtlPolicy::new().with_default(self.default_ttl_secs), |policy, (domain, ttl)| {
        policy.with_override(domain.clone(), *ttl)
      })
  }

  pub fn build<V: Clone>(&self) -> ResultCache<V> {
    ResultCache::new()
      .with_max_size(self.max_size)
      .with_policy(self.ttl_policy())
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
  /// Enum fields that must never be quoted (case-insensitive)
  #[serde(
    default = "default_exempt_fields",
    deserialize_with = "deserialize_lowercase_set"
  )]
  pub exempt_fields: BTreeSet<String>,
  /// Field that scopes a query to one container
  #[serde(default = "default_scope_field")]
  pub scope_field: String,
}

impl Default for QueryConfig {
  fn default() -> Self {
    Self {
      exempt_fields: default_exempt_fields(),
      scope_field: default_scope_field(),
    }
  }
}

impl QueryConfig {
  pub fn compiler(&self) -> QueryCompiler {
    QueryCompiler::new()
      .with_exempt_fields(&self.exempt_fields)
      .with_scope_field(self.scope_field.clone())
  }

  pub fn validator(&self) -> QueryValidator {
    QueryValidator::new().with_scope_field(self.scope_field.clone())
  }
}

fn default_exempt_fields() -> BTreeSet<String> {
  DEFAULT_EXEMPT_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn default_scope_field() -> String {
  DEFAULT_SCOPE_FIELD.to_string()
}

fn deserialize_lowercase_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(v.into_iter().map(|s| s.to_lowercase()).collect())
}

impl Config {
  /// Load configuration, or fall back to defaults with no backend.
  ///
  /// An explicit path must exist. Otherwise the first existing file among
  /// `./trackq.yaml` and `$XDG_CONFIG_HOME/trackq/config.yaml` is used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    match explicit_path {
      Some(path) if !path.exists() => Err(eyre!("Config file not found: {}", path.display())),
      Some(path) => Self::load_from_path(path),
      None => Self::load_first(&Self::search_paths()),
    }
  }

  fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    paths.extend(dirs::config_dir().map(|dir| dir.join("trackq").join("config.yaml")));
    paths
  }

  fn load_first(candidates: &[PathBuf]) -> Result<Self> {
    match candidates.iter().find(|path| path.exists()) {
      Some(path) => Self::load_from_path(path),
      None => {
        debug!(searched = ?candidates, "no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    debug!(path = %path.display(), "loading config");
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  /// The backend section, required for executing queries.
  pub fn backend(&self) -> Result<&BackendConfig> {
    self.backend.as_ref().ok_or_else(|| {
      eyre!(
        "No backend configured. Add a `backend.url` entry to ~/.config/trackq/config.yaml"
      )
    })
  }

  /// Get the tracker API token from environment variables.
  ///
  /// Checks TRACKQ_TOKEN first, then YOUTRACK_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("TRACKQ_TOKEN")
      .or_else(|_| std::env::var("YOUTRACK_TOKEN"))
      .map_err(|_| {
        eyre!("Tracker API token not found. Set TRACKQ_TOKEN or YOUTRACK_TOKEN environment variable.")
      })
  }
}
