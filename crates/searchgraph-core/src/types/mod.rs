//! # Core Type Definitions
//!
//! This module contains all core types for the searchgraph keyword graph:
//! - Graph identifiers and counters (`NodeId`, `EdgeCount`, `EdgeKind`, `EdgeRecord`)
//! - Search log input (`Keyword`, `SearchEvent`)
//! - Population partitioning (`Identifier`, `IdentifierBucket`)
//! - Store summaries (`GraphStatus`)
//! - Error types (`SearchGraphError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they key a `BTreeMap`/`BTreeSet`
//! - Use saturating arithmetic for counters to prevent overflow

use crate::primitives::DAY_KEY_LEN;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Unique identifier for a keyword node in the internal graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Running occurrence count carried by every relationship.
///
/// Created at 1 on first occurrence and bumped by 1 on every later one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EdgeCount(pub u64);

impl EdgeCount {
    /// Create a new count with the given value.
    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    /// Increment the count by 1 using saturating arithmetic.
    /// This is the ONLY allowed mutation for edge counts.
    #[must_use]
    pub const fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Get the raw count value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// The two relationship kinds held by the keyword graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Keyword A was searched immediately before keyword B on the same day.
    Next,
    /// A search classified as unsuccessful (A) was followed by search B.
    FailNext,
}

impl EdgeKind {
    /// Relationship label as it appears in exports and API responses.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Next => "NEXT",
            Self::FailNext => "FAIL_NEXT",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stored state of one directed relationship.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Running occurrence count.
    pub count: EdgeCount,
    /// Timestamp of the most recent occurrence, when the caller supplied one.
    pub last_observed: Option<String>,
}

impl EdgeRecord {
    /// Return the record after one more occurrence.
    #[must_use]
    pub fn bumped(self, observed_at: Option<&str>) -> Self {
        Self {
            count: self.count.increment(),
            last_observed: observed_at.map(str::to_string).or(self.last_observed),
        }
    }
}

// =============================================================================
// KEYWORD
// =============================================================================

/// A normalized search query string, the unit node of the graph.
///
/// Normalization is limited to trimming surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Keyword(String);

impl Keyword {
    /// Create a keyword, trimming surrounding whitespace.
    #[must_use]
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().trim().to_string())
    }

    /// Get the keyword as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the keyword is empty after trimming.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Keyword {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// SEARCH EVENT
// =============================================================================

/// One parsed search log record.
///
/// Produced by the boundary parser from a raw log hit. An event takes part
/// in extraction only when both its keyword and its derived day are
/// non-empty; anything else is skipped without touching engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEvent {
    /// The trimmed search query.
    pub keyword: Keyword,
    /// ISO-like creation timestamp, possibly already truncated to a day.
    pub timestamp: String,
    /// Failure signal carried by the record itself.
    ///
    /// Only consulted by failure predicates that choose to trust it.
    pub is_failure: bool,
}

impl SearchEvent {
    /// Create a new event with no failure signal.
    #[must_use]
    pub fn new(keyword: impl AsRef<str>, timestamp: impl Into<String>) -> Self {
        Self {
            keyword: Keyword::new(keyword),
            timestamp: timestamp.into(),
            is_failure: false,
        }
    }

    /// Set the record-level failure signal.
    #[must_use]
    pub fn with_failure(mut self, is_failure: bool) -> Self {
        self.is_failure = is_failure;
        self
    }

    /// The calendar-day key: the first `DAY_KEY_LEN` characters of the timestamp.
    ///
    /// Returns `None` when the timestamp is empty.
    #[must_use]
    pub fn day(&self) -> Option<&str> {
        let ts = self.timestamp.as_str();
        if ts.is_empty() {
            return None;
        }
        let end = ts
            .char_indices()
            .nth(DAY_KEY_LEN)
            .map_or(ts.len(), |(idx, _)| idx);
        ts.get(..end)
    }
}

// =============================================================================
// IDENTIFIERS (PCID)
// =============================================================================

/// Opaque per-user/per-client key partitioning the log stream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier(pub String);

impl Identifier {
    /// Create a new identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One terms-aggregation bucket: an identifier and its event count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierBucket {
    pub key: Identifier,
    pub doc_count: u64,
}

// =============================================================================
// STORE SUMMARY
// =============================================================================

/// Counts returned by the store's connectivity test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphStatus {
    pub node_count: usize,
    pub next_edge_count: usize,
    pub fail_edge_count: usize,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the searchgraph system.
///
/// - No silent failures
/// - Use `Result<T, SearchGraphError>` for fallible operations
/// - The CORE should never panic; all errors must be recoverable
#[derive(Debug, Error)]
pub enum SearchGraphError {
    /// A keyword or relationship request is malformed.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// The requested keyword is not in the graph.
    #[error("Keyword not found: {0}")]
    KeywordNotFound(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The log source could not be reached or answered unexpectedly.
    #[error("Log source error: {0}")]
    LogSourceError(String),

    /// The configuration is missing or inconsistent.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Processing one identifier exceeded its time budget.
    #[error("Timed out after {0}s")]
    Timeout(u64),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_count_saturating_increment() {
        let count = EdgeCount::new(u64::MAX);
        assert_eq!(count.increment().value(), u64::MAX);
    }

    #[test]
    fn edge_count_normal_increment() {
        assert_eq!(EdgeCount::default().increment().value(), 1);
    }

    #[test]
    fn keyword_is_trimmed() {
        let kw = Keyword::new("  치킨 \t");
        assert_eq!(kw.as_str(), "치킨");
        assert!(Keyword::new("   ").is_empty());
    }

    #[test]
    fn day_is_first_ten_characters() {
        let event = SearchEvent::new("a", "2024-12-03T10:22:01.000");
        assert_eq!(event.day(), Some("2024-12-03"));
    }

    #[test]
    fn day_of_short_timestamp_is_whole_string() {
        let event = SearchEvent::new("a", "d1");
        assert_eq!(event.day(), Some("d1"));
    }

    #[test]
    fn day_of_empty_timestamp_is_none() {
        assert_eq!(SearchEvent::new("a", "").day(), None);
    }

    #[test]
    fn day_respects_char_boundaries() {
        let event = SearchEvent::new("a", "이천이십사년십이월삼일오전");
        assert_eq!(event.day(), Some("이천이십사년십이월삼"));
    }

    #[test]
    fn bumped_keeps_previous_timestamp_when_none_given() {
        let record = EdgeRecord::default().bumped(Some("2024-12-01T00:00:00"));
        let record = record.bumped(None);
        assert_eq!(record.count, EdgeCount::new(2));
        assert_eq!(record.last_observed.as_deref(), Some("2024-12-01T00:00:00"));
    }

    #[test]
    fn edge_kind_labels() {
        assert_eq!(EdgeKind::Next.to_string(), "NEXT");
        assert_eq!(EdgeKind::FailNext.to_string(), "FAIL_NEXT");
    }
}
