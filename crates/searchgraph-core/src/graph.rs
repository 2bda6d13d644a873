//! # Keyword Graph
//!
//! The keyword graph store for searchgraph CORE.
//!
//! This module defines the `KeywordGraphStore` trait and its in-memory
//! implementation. All data structures use `BTreeMap` for deterministic
//! ordering.

use crate::primitives::MAX_KEYWORD_LENGTH;
use crate::{EdgeCount, EdgeKind, EdgeRecord, GraphStatus, Keyword, NodeId, SearchGraphError};
use std::collections::BTreeMap;

// =============================================================================
// KEYWORDGRAPHSTORE TRAIT
// =============================================================================

/// The operations the extraction engine and the facades need from a graph store.
///
/// Writes are upserts: calling them repeatedly never duplicates a node or an
/// edge, it only bumps counts. Every implementation must make one
/// `increment_edge` call atomic for the edge it touches.
pub trait KeywordGraphStore {
    /// Insert the keyword node if absent. Returns the NodeId either way.
    fn merge_keyword(&mut self, keyword: &Keyword) -> Result<NodeId, SearchGraphError>;

    /// Upsert-or-increment the `kind` edge `from -> to`.
    ///
    /// Both endpoint keywords are merged first. The edge is created with
    /// count 1 on first occurrence and incremented afterwards. A self-loop
    /// request (`from == to`) is ignored and reports a count of 0.
    fn increment_edge(
        &mut self,
        kind: EdgeKind,
        from: &Keyword,
        to: &Keyword,
        observed_at: Option<&str>,
    ) -> Result<EdgeCount, SearchGraphError>;

    /// Get the stored record of an edge.
    fn get_edge(
        &self,
        kind: EdgeKind,
        from: &Keyword,
        to: &Keyword,
    ) -> Result<Option<EdgeRecord>, SearchGraphError>;

    /// Outgoing `kind` edges of `from`, descending by count, ties by keyword.
    fn next_list(
        &self,
        kind: EdgeKind,
        from: &Keyword,
    ) -> Result<Vec<(Keyword, EdgeCount)>, SearchGraphError>;

    /// Check if a keyword node exists.
    fn contains_keyword(&self, keyword: &Keyword) -> Result<bool, SearchGraphError>;

    /// Get the total number of keyword nodes.
    fn node_count(&self) -> Result<usize, SearchGraphError>;

    /// Get the number of edges of one kind.
    fn edge_count(&self, kind: EdgeKind) -> Result<usize, SearchGraphError>;

    /// Delete every node and edge.
    fn clear_all(&mut self) -> Result<(), SearchGraphError>;

    /// Connectivity test: touches the store and reports its size.
    fn ping(&self) -> Result<GraphStatus, SearchGraphError> {
        Ok(GraphStatus {
            node_count: self.node_count()?,
            next_edge_count: self.edge_count(EdgeKind::Next)?,
            fail_edge_count: self.edge_count(EdgeKind::FailNext)?,
        })
    }
}

/// Validate a keyword before it reaches a store.
///
/// A keyword is valid if it is non-empty and within `MAX_KEYWORD_LENGTH` bytes.
pub fn validate_keyword(keyword: &Keyword) -> Result<(), SearchGraphError> {
    if keyword.is_empty() {
        return Err(SearchGraphError::InvalidEvent("empty keyword".to_string()));
    }
    if keyword.as_str().len() > MAX_KEYWORD_LENGTH {
        return Err(SearchGraphError::InvalidEvent(format!(
            "keyword exceeds {} bytes",
            MAX_KEYWORD_LENGTH
        )));
    }
    Ok(())
}

/// Order an outgoing edge list: descending count, then keyword ascending.
pub(crate) fn rank_next_list(list: &mut [(Keyword, EdgeCount)]) {
    list.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

// =============================================================================
// IN-MEMORY GRAPH
// =============================================================================

/// The in-memory keyword graph.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct KeywordGraph {
    /// Node storage: NodeId -> Keyword
    keywords: BTreeMap<NodeId, Keyword>,

    /// Reverse lookup: Keyword -> NodeId
    keyword_index: BTreeMap<Keyword, NodeId>,

    /// NEXT edges: (from, to) -> record
    next_edges: BTreeMap<(NodeId, NodeId), EdgeRecord>,

    /// FAIL_NEXT edges: (from, to) -> record
    fail_edges: BTreeMap<(NodeId, NodeId), EdgeRecord>,

    /// Next available NodeId
    next_node_id: u64,
}

impl KeywordGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all edges of one kind as `(from, to, record)` in deterministic order.
    pub fn edges(&self, kind: EdgeKind) -> impl Iterator<Item = (&Keyword, &Keyword, &EdgeRecord)> {
        self.edge_table(kind)
            .iter()
            .filter_map(|((from, to), record)| {
                Some((self.keywords.get(from)?, self.keywords.get(to)?, record))
            })
    }

    /// Get the NodeId of a keyword.
    #[must_use]
    pub fn node_of(&self, keyword: &Keyword) -> Option<NodeId> {
        self.keyword_index.get(keyword).copied()
    }

    fn edge_table(&self, kind: EdgeKind) -> &BTreeMap<(NodeId, NodeId), EdgeRecord> {
        match kind {
            EdgeKind::Next => &self.next_edges,
            EdgeKind::FailNext => &self.fail_edges,
        }
    }

    fn edge_table_mut(&mut self, kind: EdgeKind) -> &mut BTreeMap<(NodeId, NodeId), EdgeRecord> {
        match kind {
            EdgeKind::Next => &mut self.next_edges,
            EdgeKind::FailNext => &mut self.fail_edges,
        }
    }
}

impl KeywordGraphStore for KeywordGraph {
    fn merge_keyword(&mut self, keyword: &Keyword) -> Result<NodeId, SearchGraphError> {
        validate_keyword(keyword)?;

        // Return existing node if keyword already mapped
        if let Some(&node_id) = self.keyword_index.get(keyword) {
            return Ok(node_id);
        }

        let node_id = NodeId(self.next_node_id);
        self.next_node_id = self.next_node_id.saturating_add(1);

        self.keywords.insert(node_id, keyword.clone());
        self.keyword_index.insert(keyword.clone(), node_id);

        Ok(node_id)
    }

    fn increment_edge(
        &mut self,
        kind: EdgeKind,
        from: &Keyword,
        to: &Keyword,
        observed_at: Option<&str>,
    ) -> Result<EdgeCount, SearchGraphError> {
        if from == to {
            return Ok(EdgeCount::default());
        }
        let from_id = self.merge_keyword(from)?;
        let to_id = self.merge_keyword(to)?;

        let table = self.edge_table_mut(kind);
        let record = table
            .remove(&(from_id, to_id))
            .unwrap_or_default()
            .bumped(observed_at);
        let count = record.count;
        table.insert((from_id, to_id), record);
        Ok(count)
    }

    fn get_edge(
        &self,
        kind: EdgeKind,
        from: &Keyword,
        to: &Keyword,
    ) -> Result<Option<EdgeRecord>, SearchGraphError> {
        let (Some(from_id), Some(to_id)) = (self.node_of(from), self.node_of(to)) else {
            return Ok(None);
        };
        Ok(self.edge_table(kind).get(&(from_id, to_id)).cloned())
    }

    fn next_list(
        &self,
        kind: EdgeKind,
        from: &Keyword,
    ) -> Result<Vec<(Keyword, EdgeCount)>, SearchGraphError> {
        let Some(from_id) = self.node_of(from) else {
            return Ok(Vec::new());
        };
        let mut list: Vec<(Keyword, EdgeCount)> = self
            .edge_table(kind)
            .range((from_id, NodeId(0))..=(from_id, NodeId(u64::MAX)))
            .filter_map(|((_, to), record)| {
                self.keywords.get(to).map(|kw| (kw.clone(), record.count))
            })
            .collect();
        rank_next_list(&mut list);
        Ok(list)
    }

    fn contains_keyword(&self, keyword: &Keyword) -> Result<bool, SearchGraphError> {
        Ok(self.keyword_index.contains_key(keyword))
    }

    fn node_count(&self) -> Result<usize, SearchGraphError> {
        Ok(self.keywords.len())
    }

    fn edge_count(&self, kind: EdgeKind) -> Result<usize, SearchGraphError> {
        Ok(self.edge_table(kind).len())
    }

    fn clear_all(&mut self) -> Result<(), SearchGraphError> {
        *self = Self::default();
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
