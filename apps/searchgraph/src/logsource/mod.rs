//! # Log Source
//!
//! The search-log side of searchgraph: the `LogSource` trait the replay
//! driver talks to, the request bodies it sends, and the boundary parser
//! that turns raw hits into `SearchEvent`s.
//!
//! Hits are untyped JSON up to `parse_hit`. Every missing-field tolerance
//! lives there, so the extraction engine only ever sees validated events.

mod elastic;

pub use elastic::ElasticLogSource;

use async_trait::async_trait;
use searchgraph_core::{Identifier, IdentifierBucket, SearchEvent, SearchGraphError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;

/// Name of the terms aggregation in identifier aggregation requests.
pub const IDENTIFIER_AGGREGATION: &str = "user_pcid";

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// Inclusive timestamp window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub gte: String,
    pub lte: String,
}

impl TimeWindow {
    #[must_use]
    pub fn new(gte: impl Into<String>, lte: impl Into<String>) -> Self {
        Self {
            gte: gte.into(),
            lte: lte.into(),
        }
    }
}

/// A fixed, pre-sorted query loaded from a file and run once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticQuery {
    pub query: Value,
    pub sort: Value,
    #[serde(default = "default_static_size")]
    pub size: usize,
}

fn default_static_size() -> usize {
    searchgraph_core::primitives::DEFAULT_RESULT_CEILING
}

impl StaticQuery {
    /// Parse a query file's JSON text. `query` and `sort` are required.
    pub fn from_json(text: &str) -> Result<Self, SearchGraphError> {
        serde_json::from_str(text).map_err(|e| {
            SearchGraphError::ConfigError(format!("invalid query file: {}", e))
        })
    }

    /// Load a query file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SearchGraphError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SearchGraphError::ConfigError(format!(
                "cannot read query file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&text)
    }

    /// Request body sent to the search endpoint.
    #[must_use]
    pub fn body(&self) -> Value {
        json!({
            "query": self.query,
            "sort": self.sort,
            "size": self.size,
        })
    }
}

/// Where identifier and timestamp live in each document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub identifier_field: String,
    pub timestamp_field: String,
}

impl FieldLayout {
    /// Per-identifier query: term filter on the identifier, range filter on
    /// the window, ascending by timestamp, at most `ceiling` hits.
    #[must_use]
    pub fn identifier_query(
        &self,
        identifier: &Identifier,
        window: &TimeWindow,
        ceiling: usize,
    ) -> Value {
        let range = json!({ "gte": window.gte, "lte": window.lte });
        json!({
            "query": {
                "bool": {
                    "must": [
                        { "term": { self.identifier_field.as_str(): identifier.as_str() } }
                    ],
                    "filter": [
                        { "range": { self.timestamp_field.as_str(): range } }
                    ]
                }
            },
            "sort": [ { self.timestamp_field.as_str(): { "order": "asc" } } ],
            "size": ceiling,
        })
    }

    /// Terms aggregation over the identifier field inside the window,
    /// returning the `size` most frequent identifiers and no hits.
    #[must_use]
    pub fn identifier_aggregation(&self, window: &TimeWindow, size: usize) -> Value {
        json!({
            "size": 0,
            "query": {
                "range": { self.timestamp_field.as_str(): { "gte": window.gte, "lte": window.lte } }
            },
            "aggs": {
                IDENTIFIER_AGGREGATION: {
                    "terms": { "field": self.identifier_field, "size": size }
                }
            }
        })
    }
}

// =============================================================================
// LOG SOURCE TRAIT
// =============================================================================

/// A searchable store of search-log documents.
///
/// Implementations return raw hits in the order the source sorted them.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Run a static query over the whole index.
    async fn search_static(&self, query: &StaticQuery) -> Result<Vec<Value>, SearchGraphError>;

    /// Fetch one identifier's hits inside the window, oldest first.
    async fn fetch_identifier_hits(
        &self,
        identifier: &Identifier,
        window: &TimeWindow,
        ceiling: usize,
    ) -> Result<Vec<Value>, SearchGraphError>;

    /// The `size` most frequent identifiers inside the window.
    async fn aggregate_identifiers(
        &self,
        window: &TimeWindow,
        size: usize,
    ) -> Result<Vec<IdentifierBucket>, SearchGraphError>;
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

/// The hit array of a search response (`hits.hits`), empty when absent.
#[must_use]
pub fn hits_of(response: &Value) -> Vec<Value> {
    response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// The buckets of the identifier aggregation, empty when absent.
///
/// Non-string bucket keys (numeric identifiers) are stringified.
#[must_use]
pub fn buckets_of(response: &Value) -> Vec<IdentifierBucket> {
    let Some(buckets) = response
        .get("aggregations")
        .and_then(|aggs| aggs.get(IDENTIFIER_AGGREGATION))
        .and_then(|agg| agg.get("buckets"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    buckets
        .iter()
        .filter_map(|bucket| {
            let key = text_of(bucket.get("key"));
            if key.is_empty() {
                return None;
            }
            Some(IdentifierBucket {
                key: Identifier::new(key),
                doc_count: bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
            })
        })
        .collect()
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Like `text_of`, but a zero, `false` or empty container is no query at all.
fn query_text_of(value: Option<&Value>) -> String {
    let blank = match value {
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        _ => false,
    };
    if blank { String::new() } else { text_of(value) }
}

/// Parse one raw hit into a `SearchEvent`.
///
/// Reads `_source.<key_field>.{search_query, created_date_time, result_count}`.
/// Missing pieces become empty strings, which the engine then skips, and so
/// does a `search_query` of `0` or `false`. The failure flag is set when
/// `result_count` is present and zero.
#[must_use]
pub fn parse_hit(hit: &Value, key_field: &str) -> SearchEvent {
    let record = hit.get("_source").and_then(|source| source.get(key_field));
    let field = |name: &str| record.and_then(|r| r.get(name));

    let keyword = query_text_of(field("search_query"));
    let timestamp = text_of(field("created_date_time"));
    let is_failure = field("result_count")
        .and_then(Value::as_u64)
        .is_some_and(|count| count == 0);

    SearchEvent::new(keyword, timestamp).with_failure(is_failure)
}

/// Parse a hit array, preserving order.
#[must_use]
pub fn parse_hits(hits: &[Value], key_field: &str) -> Vec<SearchEvent> {
    hits.iter().map(|hit| parse_hit(hit, key_field)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> FieldLayout {
        FieldLayout {
            identifier_field: "query_log.user_pcid.keyword".to_string(),
            timestamp_field: "query_log.created_date_time".to_string(),
        }
    }

    #[test]
    fn parse_hit_reads_nested_fields() {
        let hit = json!({
            "_source": {
                "query_log": {
                    "search_query": "  치킨  ",
                    "created_date_time": "2024-12-03T10:22:01.000",
                    "user_pcid": "pc-1",
                    "result_count": 0
                }
            }
        });

        let event = parse_hit(&hit, "query_log");
        assert_eq!(event.keyword.as_str(), "치킨");
        assert_eq!(event.day(), Some("2024-12-03"));
        assert!(event.is_failure);
    }

    #[test]
    fn parse_hit_tolerates_missing_fields() {
        let event = parse_hit(&json!({ "_source": {} }), "query_log");
        assert!(event.keyword.is_empty());
        assert_eq!(event.day(), None);
        assert!(!event.is_failure);

        let event = parse_hit(&json!({}), "query_log");
        assert!(event.keyword.is_empty());
    }

    #[test]
    fn parse_hit_stringifies_non_string_query() {
        let hit = json!({
            "_source": {
                "log": {
                    "search_query": 1004,
                    "created_date_time": "2024-12-03",
                    "result_count": 3
                }
            }
        });
        let event = parse_hit(&hit, "log");
        assert_eq!(event.keyword.as_str(), "1004");
        assert!(!event.is_failure);
    }

    #[test]
    fn parse_hit_null_query_is_empty() {
        let hit = json!({
            "_source": { "query_log": { "search_query": null, "created_date_time": "2024-12-03" } }
        });
        assert!(parse_hit(&hit, "query_log").keyword.is_empty());
    }

    #[test]
    fn parse_hit_falsy_query_is_empty() {
        for query in [json!(0), json!(0.0), json!(false), json!(""), json!([])] {
            let hit = json!({
                "_source": {
                    "query_log": { "search_query": query, "created_date_time": "2024-12-03" }
                }
            });
            let event = parse_hit(&hit, "query_log");
            assert!(event.keyword.is_empty(), "{} should be empty", query);
        }

        let hit = json!({
            "_source": { "query_log": { "search_query": true, "created_date_time": "2024-12-03" } }
        });
        assert_eq!(parse_hit(&hit, "query_log").keyword.as_str(), "true");
    }

    #[test]
    fn hits_of_extracts_array() {
        let response = json!({
            "hits": { "total": { "value": 2 }, "hits": [ { "_id": "1" }, { "_id": "2" } ] }
        });
        assert_eq!(hits_of(&response).len(), 2);
        assert!(hits_of(&json!({ "took": 3 })).is_empty());
    }

    #[test]
    fn buckets_of_extracts_aggregation() {
        let response = json!({
            "aggregations": {
                "user_pcid": {
                    "buckets": [
                        { "key": "pc-1", "doc_count": 42 },
                        { "key": 7, "doc_count": 3 },
                        { "key": "", "doc_count": 1 }
                    ]
                }
            }
        });

        let buckets = buckets_of(&response);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key.as_str(), "pc-1");
        assert_eq!(buckets[0].doc_count, 42);
        assert_eq!(buckets[1].key.as_str(), "7");
        assert!(buckets_of(&json!({})).is_empty());
    }

    #[test]
    fn identifier_query_shape() {
        let body = layout().identifier_query(
            &Identifier::new("pc-1"),
            &TimeWindow::new("2024-12-01T00:00:00.000", "2025-01-01T00:00:00.000"),
            500,
        );

        assert_eq!(
            body.pointer("/query/bool/must/0/term/query_log.user_pcid.keyword"),
            Some(&json!("pc-1"))
        );
        assert_eq!(
            body.pointer("/query/bool/filter/0/range/query_log.created_date_time/gte"),
            Some(&json!("2024-12-01T00:00:00.000"))
        );
        assert_eq!(
            body.pointer("/sort/0/query_log.created_date_time/order"),
            Some(&json!("asc"))
        );
        assert_eq!(body.get("size"), Some(&json!(500)));
    }

    #[test]
    fn aggregation_shape() {
        let body = layout().identifier_aggregation(&TimeWindow::new("a", "b"), 10);

        assert_eq!(body.get("size"), Some(&json!(0)));
        assert_eq!(
            body.pointer("/aggs/user_pcid/terms/field"),
            Some(&json!("query_log.user_pcid.keyword"))
        );
        assert_eq!(body.pointer("/aggs/user_pcid/terms/size"), Some(&json!(10)));
    }

    #[test]
    fn static_query_defaults_size() {
        let query = StaticQuery::from_json(
            r#"{
                "query": { "match_all": {} },
                "sort": [ { "query_log.created_date_time": "asc" } ]
            }"#,
        )
        .expect("parse");
        assert_eq!(query.size, 10_000);
        assert_eq!(query.body().get("size"), Some(&json!(10_000)));
    }

    #[test]
    fn static_query_requires_sort() {
        let result = StaticQuery::from_json(r#"{ "query": { "match_all": {} } }"#);
        assert!(matches!(result, Err(SearchGraphError::ConfigError(_))));
    }
}
