//! # Session Module
//!
//! A `Session` is the handle the app layer holds on the keyword graph.
//!
//! ## Storage Backends
//!
//! Session supports two storage backends:
//! - `InMemory`: Uses in-memory `KeywordGraph` (fast, volatile)
//! - `Persistent`: Uses `RedbKeywordGraph` for disk-backed ACID storage
//!
//! Both are driven through the `KeywordGraphStore` trait, so the extraction
//! engine never needs to know which one it is writing to.

use crate::graph::{KeywordGraph, KeywordGraphStore};
use crate::storage::RedbKeywordGraph;
use crate::{EdgeCount, EdgeKind, EdgeRecord, GraphStatus, Keyword, NodeId, SearchGraphError};
use std::path::Path;

/// Storage backend for a Session.
#[derive(Debug)]
enum StorageBackend {
    /// In-memory graph (fast, volatile).
    InMemory(KeywordGraph),
    /// Disk-backed graph using redb (ACID, persistent).
    Persistent(RedbKeywordGraph),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(KeywordGraph::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbKeywordGraph holds a database handle that cannot be cloned.

/// A Session owns one keyword graph backend.
#[derive(Debug, Default)]
pub struct Session {
    backend: StorageBackend,
}

impl Session {
    /// Create a new empty session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    /// Every upsert is committed to disk before it returns.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, SearchGraphError> {
        let redb = RedbKeywordGraph::open(path)?;
        Ok(Self {
            backend: StorageBackend::Persistent(redb),
        })
    }

    /// Reclaim space after large deletions. No-op for in-memory storage.
    pub fn compact(&mut self) -> Result<(), SearchGraphError> {
        match &mut self.backend {
            StorageBackend::InMemory(_) => Ok(()),
            StorageBackend::Persistent(redb) => redb.compact(),
        }
    }
}

impl KeywordGraphStore for Session {
    fn merge_keyword(&mut self, keyword: &Keyword) -> Result<NodeId, SearchGraphError> {
        match &mut self.backend {
            StorageBackend::InMemory(g) => g.merge_keyword(keyword),
            StorageBackend::Persistent(r) => r.merge_keyword(keyword),
        }
    }

    fn increment_edge(
        &mut self,
        kind: EdgeKind,
        from: &Keyword,
        to: &Keyword,
        observed_at: Option<&str>,
    ) -> Result<EdgeCount, SearchGraphError> {
        match &mut self.backend {
            StorageBackend::InMemory(g) => g.increment_edge(kind, from, to, observed_at),
            StorageBackend::Persistent(r) => r.increment_edge(kind, from, to, observed_at),
        }
    }

    fn get_edge(
        &self,
        kind: EdgeKind,
        from: &Keyword,
        to: &Keyword,
    ) -> Result<Option<EdgeRecord>, SearchGraphError> {
        match &self.backend {
            StorageBackend::InMemory(g) => g.get_edge(kind, from, to),
            StorageBackend::Persistent(r) => r.get_edge(kind, from, to),
        }
    }

    fn next_list(
        &self,
        kind: EdgeKind,
        from: &Keyword,
    ) -> Result<Vec<(Keyword, EdgeCount)>, SearchGraphError> {
        match &self.backend {
            StorageBackend::InMemory(g) => g.next_list(kind, from),
            StorageBackend::Persistent(r) => r.next_list(kind, from),
        }
    }

    fn contains_keyword(&self, keyword: &Keyword) -> Result<bool, SearchGraphError> {
        match &self.backend {
            StorageBackend::InMemory(g) => g.contains_keyword(keyword),
            StorageBackend::Persistent(r) => r.contains_keyword(keyword),
        }
    }

    fn node_count(&self) -> Result<usize, SearchGraphError> {
        match &self.backend {
            StorageBackend::InMemory(g) => g.node_count(),
            StorageBackend::Persistent(r) => r.node_count(),
        }
    }

    fn edge_count(&self, kind: EdgeKind) -> Result<usize, SearchGraphError> {
        match &self.backend {
            StorageBackend::InMemory(g) => g.edge_count(kind),
            StorageBackend::Persistent(r) => r.edge_count(kind),
        }
    }

    fn clear_all(&mut self) -> Result<(), SearchGraphError> {
        match &mut self.backend {
            StorageBackend::InMemory(g) => g.clear_all(),
            StorageBackend::Persistent(r) => r.clear_all(),
        }
    }

    fn ping(&self) -> Result<GraphStatus, SearchGraphError> {
        match &self.backend {
            StorageBackend::InMemory(g) => g.ping(),
            StorageBackend::Persistent(r) => r.ping(),
        }
    }
}
