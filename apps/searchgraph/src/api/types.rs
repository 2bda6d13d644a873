//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use searchgraph_core::{
    EdgeCount, EdgeKind, GraphStatus, Keyword, SearchGraphError, validate_keyword,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Graph status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub node_count: usize,
    pub next_edge_count: usize,
    pub fail_edge_count: usize,
}

impl From<GraphStatus> for StatusResponse {
    fn from(status: GraphStatus) -> Self {
        Self {
            node_count: status.node_count,
            next_edge_count: status.next_edge_count,
            fail_edge_count: status.fail_edge_count,
        }
    }
}

// =============================================================================
// NEXT REQUEST/RESPONSE
// =============================================================================

/// Record one `from -> to` transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextRequest {
    pub from_kw: String,
    pub to_kw: String,
}

impl NextRequest {
    /// Normalize and validate both keywords.
    ///
    /// Rejects empty or oversized keywords and self-transitions.
    pub fn to_keywords(&self) -> Result<(Keyword, Keyword), SearchGraphError> {
        let from = Keyword::new(&self.from_kw);
        let to = Keyword::new(&self.to_kw);
        validate_keyword(&from)?;
        validate_keyword(&to)?;
        if from == to {
            return Err(SearchGraphError::InvalidEvent(
                "from_kw and to_kw must differ".to_string(),
            ));
        }
        Ok((from, to))
    }
}

/// Count of the transition after recording it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextResponse {
    pub from: String,
    pub to: String,
    pub count: u64,
}

// =============================================================================
// NEXT LIST RESPONSE
// =============================================================================

/// One outgoing edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextEntry {
    pub next: String,
    pub count: u64,
}

/// Outgoing edges of one kind, most frequent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextListResponse {
    pub keyword: String,
    pub relation: String,
    pub next: Vec<NextEntry>,
}

impl NextListResponse {
    #[must_use]
    pub fn new(keyword: &Keyword, kind: EdgeKind, list: Vec<(Keyword, EdgeCount)>) -> Self {
        Self {
            keyword: keyword.to_string(),
            relation: kind.label().to_string(),
            next: list
                .into_iter()
                .map(|(next, count)| NextEntry {
                    next: next.to_string(),
                    count: count.value(),
                })
                .collect(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
