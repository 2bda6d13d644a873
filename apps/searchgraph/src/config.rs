//! # Configuration
//!
//! Runtime configuration for the searchgraph binary.
//!
//! Resolution order (later wins):
//! 1. Built-in defaults
//! 2. TOML file (`searchgraph.toml` or `-c/--config`)
//! 3. Environment variables (`ELASTIC_URL`, `SEARCHGRAPH_INDEX`,
//!    `SEARCHGRAPH_DB`, `SEARCHGRAPH_LOG_LEVEL`)
//! 4. CLI flags, applied by the command layer

use searchgraph_core::primitives::{DEFAULT_AGGREGATION_SIZE, DEFAULT_RESULT_CEILING};
use searchgraph_core::{AlwaysFail, FailurePredicate, FlaggedFailure, SearchEvent, SearchGraphError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "searchgraph.toml";

const ENV_ELASTIC_URL: &str = "ELASTIC_URL";
const ENV_INDEX: &str = "SEARCHGRAPH_INDEX";
const ENV_DB: &str = "SEARCHGRAPH_DB";
const ENV_LOG_LEVEL: &str = "SEARCHGRAPH_LOG_LEVEL";

// =============================================================================
// TOP LEVEL
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log verbosity (`ERROR`, `WARN`, `INFO`, `DEBUG`, `TRACE`).
    pub log_level: String,
    pub elasticsearch: ElasticConfig,
    pub graph: GraphConfig,
    pub replay: ReplayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            elasticsearch: ElasticConfig::default(),
            graph: GraphConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, SearchGraphError> {
        toml::from_str(text).map_err(|e| SearchGraphError::ConfigError(e.to_string()))
    }

    /// Load the configuration file, falling back to defaults when the
    /// default file is absent. An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, SearchGraphError> {
        let config = match path {
            Some(path) => Self::from_toml_str(&read_config(path)?)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_toml_str(&read_config(default_path)?)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply environment overrides through `lookup`.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_ELASTIC_URL) {
            self.elasticsearch.url = url;
        }
        if let Some(index) = lookup(ENV_INDEX) {
            self.elasticsearch.index_name = index;
        }
        if let Some(db) = lookup(ENV_DB) {
            self.graph.path = PathBuf::from(db);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), SearchGraphError> {
        self.elasticsearch.validate()?;
        self.replay.validate()?;
        if self.graph.path.as_os_str().is_empty() && self.graph.backend == GraphBackend::Redb {
            return Err(SearchGraphError::ConfigError(
                "graph.path cannot be empty for the redb backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Default tracing filter directive derived from `log_level`.
    #[must_use]
    pub fn log_filter(&self) -> String {
        let level = self.log_level.trim().to_ascii_lowercase();
        let level = match level.as_str() {
            "warning" => "warn",
            "critical" | "fatal" => "error",
            "" => "info",
            other => other,
        };
        format!("searchgraph={level},tower_http={level}")
    }
}

fn read_config(path: &Path) -> Result<String, SearchGraphError> {
    std::fs::read_to_string(path).map_err(|e| {
        SearchGraphError::ConfigError(format!("cannot read '{}': {}", path.display(), e))
    })
}

// =============================================================================
// ELASTICSEARCH
// =============================================================================

/// Log source connection and document layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticConfig {
    /// Base URL, optionally with `user:password@` credentials.
    pub url: String,
    /// Verify TLS certificates.
    pub verify_certs: bool,
    pub index_name: String,
    /// Top-level object holding the search fields in each document.
    pub key_field: String,
    /// Static query file for the `process` mode.
    pub query_file: PathBuf,
    /// Field partitioning the log by user. Defaults to `<key_field>.user_pcid.keyword`.
    pub identifier_field: Option<String>,
    /// Field events are ordered by. Defaults to `<key_field>.created_date_time`.
    pub timestamp_field: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            verify_certs: false,
            index_name: String::new(),
            key_field: "query_log".to_string(),
            query_file: PathBuf::from("./query/searchlog.json"),
            identifier_field: None,
            timestamp_field: None,
            request_timeout_secs: 60,
        }
    }
}

impl ElasticConfig {
    /// Resolved identifier field.
    #[must_use]
    pub fn identifier_field(&self) -> String {
        self.identifier_field
            .clone()
            .unwrap_or_else(|| format!("{}.user_pcid.keyword", self.key_field))
    }

    /// Resolved timestamp field.
    #[must_use]
    pub fn timestamp_field(&self) -> String {
        self.timestamp_field
            .clone()
            .unwrap_or_else(|| format!("{}.created_date_time", self.key_field))
    }

    pub fn validate(&self) -> Result<(), SearchGraphError> {
        if self.url.trim().is_empty() {
            return Err(SearchGraphError::ConfigError(
                "elasticsearch.url cannot be empty".to_string(),
            ));
        }
        if self.index_name.trim().is_empty() {
            return Err(SearchGraphError::ConfigError(
                "elasticsearch.index_name cannot be empty".to_string(),
            ));
        }
        if self.key_field.trim().is_empty() {
            return Err(SearchGraphError::ConfigError(
                "elasticsearch.key_field cannot be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(SearchGraphError::ConfigError(
                "elasticsearch.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// GRAPH STORE
// =============================================================================

/// Graph store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    /// Disk-backed redb database.
    #[default]
    Redb,
    /// Volatile in-memory graph.
    Memory,
}

impl std::str::FromStr for GraphBackend {
    type Err = SearchGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(SearchGraphError::ConfigError(format!(
                "unknown graph backend '{}' (expected redb or memory)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: GraphBackend,
    pub path: PathBuf,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackend::Redb,
            path: PathBuf::from("searchgraph.redb"),
        }
    }
}

// =============================================================================
// REPLAY
// =============================================================================

/// Failure classification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Every event is a failure.
    #[default]
    Always,
    /// Only events whose result count was zero.
    Flagged,
}

impl std::str::FromStr for FailurePolicy {
    type Err = SearchGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "flagged" => Ok(Self::Flagged),
            other => Err(SearchGraphError::ConfigError(format!(
                "unknown failure policy '{}' (expected always or flagged)",
                other
            ))),
        }
    }
}

impl FailurePredicate for FailurePolicy {
    fn is_failure(&self, event: &SearchEvent) -> bool {
        match self {
            Self::Always => AlwaysFail.is_failure(event),
            Self::Flagged => FlaggedFailure.is_failure(event),
        }
    }
}

/// Replay window, ceilings and worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Inclusive window start (ISO timestamp).
    pub gte: String,
    /// Inclusive window end (ISO timestamp).
    pub lte: String,
    /// Number of identifiers a terms aggregation returns.
    pub aggregation_size: usize,
    /// Maximum events fetched for one identifier.
    pub result_ceiling: usize,
    pub identifier_list_path: PathBuf,
    pub fail_pair_csv_path: PathBuf,
    /// Identifiers processed concurrently.
    pub concurrency: usize,
    pub identifier_timeout_secs: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            gte: "2024-12-01T00:00:00.000".to_string(),
            lte: "2025-01-01T00:00:00.000".to_string(),
            aggregation_size: DEFAULT_AGGREGATION_SIZE,
            result_ceiling: DEFAULT_RESULT_CEILING,
            identifier_list_path: PathBuf::from("./result/user_pcid_list.csv"),
            fail_pair_csv_path: PathBuf::from("./result/fail_pair_candidates.csv"),
            concurrency: 4,
            identifier_timeout_secs: 120,
            failure_policy: FailurePolicy::Always,
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), SearchGraphError> {
        if self.gte > self.lte {
            return Err(SearchGraphError::ConfigError(format!(
                "replay window is inverted: gte '{}' > lte '{}'",
                self.gte, self.lte
            )));
        }
        if self.aggregation_size == 0 {
            return Err(SearchGraphError::ConfigError(
                "replay.aggregation_size must be greater than 0".to_string(),
            ));
        }
        if self.result_ceiling == 0 {
            return Err(SearchGraphError::ConfigError(
                "replay.result_ceiling must be greater than 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(SearchGraphError::ConfigError(
                "replay.concurrency must be greater than 0".to_string(),
            ));
        }
        if self.identifier_timeout_secs == 0 {
            return Err(SearchGraphError::ConfigError(
                "replay.identifier_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.elasticsearch.index_name = "search-log".to_string();
        config
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.elasticsearch.key_field, "query_log");
        assert_eq!(
            config.elasticsearch.identifier_field(),
            "query_log.user_pcid.keyword"
        );
        assert_eq!(
            config.elasticsearch.timestamp_field(),
            "query_log.created_date_time"
        );
        assert_eq!(config.replay.result_ceiling, 10_000);
        assert_eq!(config.replay.aggregation_size, 10);
        assert_eq!(config.graph.backend, GraphBackend::Redb);
    }

    #[test]
    fn default_needs_index_name() {
        assert!(AppConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn parse_partial_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            log_level = "DEBUG"

            [elasticsearch]
            url = "https://es.internal:9200"
            index_name = "search-log-2024"
            identifier_field = "query_log.device_id"

            [replay]
            concurrency = 8
            failure_policy = "flagged"
            "#,
        )
        .expect("parse");

        assert_eq!(config.log_level, "DEBUG");
        assert_eq!(config.elasticsearch.index_name, "search-log-2024");
        assert_eq!(config.elasticsearch.identifier_field(), "query_log.device_id");
        assert_eq!(config.elasticsearch.key_field, "query_log");
        assert_eq!(config.replay.concurrency, 8);
        assert_eq!(config.replay.failure_policy, FailurePolicy::Flagged);
        assert_eq!(config.replay.result_ceiling, 10_000);
    }

    #[test]
    fn unknown_backend_rejected_at_parse() {
        let result = AppConfig::from_toml_str("[graph]\nbackend = \"neo4j\"\n");
        assert!(matches!(result, Err(SearchGraphError::ConfigError(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        let config = valid().with_env_overrides(|key| match key {
            "ELASTIC_URL" => Some("http://es:9200".to_string()),
            "SEARCHGRAPH_DB" => Some("/tmp/graph.redb".to_string()),
            _ => None,
        });

        assert_eq!(config.elasticsearch.url, "http://es:9200");
        assert_eq!(config.graph.path, PathBuf::from("/tmp/graph.redb"));
        assert_eq!(config.elasticsearch.index_name, "search-log");
    }

    #[test]
    fn inverted_window_rejected() {
        let mut config = valid();
        config.replay.gte = "2025-02-01T00:00:00.000".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_values_rejected() {
        let mutations: [fn(&mut AppConfig); 5] = [
            |c: &mut AppConfig| c.replay.concurrency = 0,
            |c: &mut AppConfig| c.replay.result_ceiling = 0,
            |c: &mut AppConfig| c.replay.aggregation_size = 0,
            |c: &mut AppConfig| c.replay.identifier_timeout_secs = 0,
            |c: &mut AppConfig| c.elasticsearch.request_timeout_secs = 0,
        ];
        for mutate in mutations {
            let mut config = valid();
            mutate(&mut config);
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn from_str_parsers() {
        assert_eq!("Memory".parse::<GraphBackend>().ok(), Some(GraphBackend::Memory));
        assert!("file".parse::<GraphBackend>().is_err());
        assert_eq!("flagged".parse::<FailurePolicy>().ok(), Some(FailurePolicy::Flagged));
        assert!("sometimes".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn failure_policy_predicates() {
        let plain = SearchEvent::new("a", "d1");
        let flagged = SearchEvent::new("a", "d1").with_failure(true);

        assert!(FailurePolicy::Always.is_failure(&plain));
        assert!(!FailurePolicy::Flagged.is_failure(&plain));
        assert!(FailurePolicy::Flagged.is_failure(&flagged));
    }

    #[test]
    fn log_filter_maps_level_aliases() {
        let mut config = AppConfig::default();
        config.log_level = "WARNING".to_string();
        assert_eq!(
            config.log_filter(),
            "searchgraph=warn,tower_http=warn"
        );
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let result = AppConfig::load(Some(&temp.path().join("absent.toml")));
        assert!(matches!(result, Err(SearchGraphError::ConfigError(_))));
    }
}
