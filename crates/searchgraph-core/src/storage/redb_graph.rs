//! # redb-backed Keyword Graph Storage
//!
//! A disk-backed keyword graph using the redb embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! Every upsert runs in its own write transaction. Since redb admits one
//! writer at a time, each `increment_edge` is atomic for the edge it
//! touches, and progress made before a crash survives it.

use crate::graph::{KeywordGraphStore, rank_next_list, validate_keyword};
use crate::{EdgeCount, EdgeKind, EdgeRecord, Keyword, NodeId, SearchGraphError};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

/// Table for keyword nodes: NodeId(u64) -> keyword
const KEYWORDS: TableDefinition<u64, &str> = TableDefinition::new("keywords");

/// Table for the keyword index: keyword -> NodeId(u64)
const KEYWORD_INDEX: TableDefinition<&str, u64> = TableDefinition::new("keyword_index");

/// Table for NEXT edges: (from_id, to_id) -> serialized EdgeRecord
const NEXT_EDGES: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("next_edges");

/// Table for FAIL_NEXT edges: (from_id, to_id) -> serialized EdgeRecord
const FAIL_EDGES: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("fail_next_edges");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_NODE_ID_KEY: &str = "next_node_id";

fn edge_table(kind: EdgeKind) -> TableDefinition<'static, (u64, u64), &'static [u8]> {
    match kind {
        EdgeKind::Next => NEXT_EDGES,
        EdgeKind::FailNext => FAIL_EDGES,
    }
}

fn io<E: Display>(e: E) -> SearchGraphError {
    SearchGraphError::IoError(e.to_string())
}

fn decode_record(bytes: &[u8]) -> Result<EdgeRecord, SearchGraphError> {
    postcard::from_bytes(bytes).map_err(|e| SearchGraphError::DeserializationError(e.to_string()))
}

/// A disk-backed keyword graph using redb.
///
/// Maintains an in-memory keyword index for fast lookups; the index is
/// rebuilt from disk on open and only updated after a successful commit.
pub struct RedbKeywordGraph {
    /// The redb database handle.
    db: Database,
    /// In-memory cache of keyword -> node mapping.
    keyword_cache: BTreeMap<Keyword, NodeId>,
    /// Next available node ID.
    next_node_id: u64,
}

impl std::fmt::Debug for RedbKeywordGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKeywordGraph")
            .field("keyword_cache_size", &self.keyword_cache.len())
            .field("next_node_id", &self.next_node_id)
            .finish_non_exhaustive()
    }
}

impl RedbKeywordGraph {
    /// Open or create a keyword graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SearchGraphError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io)?;
            Self::create_tables(&write_txn)?;
            write_txn.commit().map_err(io)?;
        }

        let read_txn = db.begin_read().map_err(io)?;

        let next_node_id = {
            let table = read_txn.open_table(METADATA).map_err(io)?;
            table
                .get(NEXT_NODE_ID_KEY)
                .map_err(io)?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        let keyword_cache = {
            let table = read_txn.open_table(KEYWORD_INDEX).map_err(io)?;
            let mut cache = BTreeMap::new();
            for entry in table.iter().map_err(io)? {
                let (key, value) = entry.map_err(io)?;
                cache.insert(Keyword::new(key.value()), NodeId(value.value()));
            }
            cache
        };

        Ok(Self {
            db,
            keyword_cache,
            next_node_id,
        })
    }

    fn create_tables(write_txn: &WriteTransaction) -> Result<(), SearchGraphError> {
        let _ = write_txn.open_table(KEYWORDS).map_err(io)?;
        let _ = write_txn.open_table(KEYWORD_INDEX).map_err(io)?;
        let _ = write_txn.open_table(NEXT_EDGES).map_err(io)?;
        let _ = write_txn.open_table(FAIL_EDGES).map_err(io)?;
        let _ = write_txn.open_table(METADATA).map_err(io)?;
        Ok(())
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), SearchGraphError> {
        self.db.compact().map_err(io)?;
        Ok(())
    }

    /// Get all edges of one kind as `(from, to, record)` in deterministic order.
    pub fn edges(
        &self,
        kind: EdgeKind,
    ) -> Result<Vec<(Keyword, Keyword, EdgeRecord)>, SearchGraphError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let keywords = read_txn.open_table(KEYWORDS).map_err(io)?;
        let edges_table = read_txn.open_table(edge_table(kind)).map_err(io)?;

        let mut edges = Vec::new();
        for entry in edges_table.iter().map_err(io)? {
            let (key, value) = entry.map_err(io)?;
            let (from_id, to_id) = key.value();
            let from = keywords.get(from_id).map_err(io)?;
            let to = keywords.get(to_id).map_err(io)?;
            if let (Some(from), Some(to)) = (from, to) {
                edges.push((
                    Keyword::new(from.value()),
                    Keyword::new(to.value()),
                    decode_record(value.value())?,
                ));
            }
        }
        Ok(edges)
    }

    /// Resolve a keyword to a NodeId inside an open write transaction,
    /// creating the node if needed.
    ///
    /// Newly created nodes are recorded in `created` so the cache can be
    /// updated once the transaction commits.
    fn merge_in_txn(
        &self,
        write_txn: &WriteTransaction,
        keyword: &Keyword,
        created: &mut BTreeMap<Keyword, NodeId>,
        next_id: &mut u64,
    ) -> Result<NodeId, SearchGraphError> {
        if let Some(&existing) = self.keyword_cache.get(keyword) {
            return Ok(existing);
        }
        if let Some(&pending) = created.get(keyword) {
            return Ok(pending);
        }

        let node_id = NodeId(*next_id);
        *next_id = next_id.saturating_add(1);

        {
            let mut keywords = write_txn.open_table(KEYWORDS).map_err(io)?;
            keywords
                .insert(node_id.0, keyword.as_str())
                .map_err(io)?;
        }
        {
            let mut index = write_txn.open_table(KEYWORD_INDEX).map_err(io)?;
            index.insert(keyword.as_str(), node_id.0).map_err(io)?;
        }
        {
            let mut meta = write_txn.open_table(METADATA).map_err(io)?;
            meta.insert(NEXT_NODE_ID_KEY, *next_id).map_err(io)?;
        }

        created.insert(keyword.clone(), node_id);
        Ok(node_id)
    }

    /// Update in-memory state after a successful commit.
    fn absorb(&mut self, created: BTreeMap<Keyword, NodeId>, next_id: u64) {
        self.next_node_id = next_id;
        self.keyword_cache.extend(created);
    }
}

// =============================================================================
// KEYWORDGRAPHSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl KeywordGraphStore for RedbKeywordGraph {
    fn merge_keyword(&mut self, keyword: &Keyword) -> Result<NodeId, SearchGraphError> {
        validate_keyword(keyword)?;
        if let Some(&node_id) = self.keyword_cache.get(keyword) {
            return Ok(node_id);
        }

        let mut created = BTreeMap::new();
        let mut next_id = self.next_node_id;

        let write_txn = self.db.begin_write().map_err(io)?;
        let node_id = self.merge_in_txn(&write_txn, keyword, &mut created, &mut next_id)?;
        write_txn.commit().map_err(io)?;

        self.absorb(created, next_id);
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
        validate_keyword(from)?;
        validate_keyword(to)?;

        let mut created = BTreeMap::new();
        let mut next_id = self.next_node_id;

        let write_txn = self.db.begin_write().map_err(io)?;
        let count = {
            let from_id = self.merge_in_txn(&write_txn, from, &mut created, &mut next_id)?;
            let to_id = self.merge_in_txn(&write_txn, to, &mut created, &mut next_id)?;

            let mut edges = write_txn.open_table(edge_table(kind)).map_err(io)?;
            let current = edges
                .get((from_id.0, to_id.0))
                .map_err(io)?
                .map(|data| decode_record(data.value()))
                .transpose()?
                .unwrap_or_default();

            let record = current.bumped(observed_at);
            let bytes = postcard::to_allocvec(&record)
                .map_err(|e| SearchGraphError::SerializationError(e.to_string()))?;
            edges
                .insert((from_id.0, to_id.0), bytes.as_slice())
                .map_err(io)?;
            record.count
        };
        write_txn.commit().map_err(io)?;

        self.absorb(created, next_id);
        Ok(count)
    }

    fn get_edge(
        &self,
        kind: EdgeKind,
        from: &Keyword,
        to: &Keyword,
    ) -> Result<Option<EdgeRecord>, SearchGraphError> {
        let (Some(from_id), Some(to_id)) =
            (self.keyword_cache.get(from), self.keyword_cache.get(to))
        else {
            return Ok(None);
        };

        let read_txn = self.db.begin_read().map_err(io)?;
        let edges = read_txn.open_table(edge_table(kind)).map_err(io)?;
        edges
            .get((from_id.0, to_id.0))
            .map_err(io)?
            .map(|data| decode_record(data.value()))
            .transpose()
    }

    fn next_list(
        &self,
        kind: EdgeKind,
        from: &Keyword,
    ) -> Result<Vec<(Keyword, EdgeCount)>, SearchGraphError> {
        let Some(from_id) = self.keyword_cache.get(from) else {
            return Ok(Vec::new());
        };

        let read_txn = self.db.begin_read().map_err(io)?;
        let keywords = read_txn.open_table(KEYWORDS).map_err(io)?;
        let edges = read_txn.open_table(edge_table(kind)).map_err(io)?;

        let mut list = Vec::new();
        for entry in edges
            .range((from_id.0, 0u64)..=(from_id.0, u64::MAX))
            .map_err(io)?
        {
            let (key, value) = entry.map_err(io)?;
            let (_from_id, to_id) = key.value();
            let record = decode_record(value.value())?;
            if let Some(to) = keywords.get(to_id).map_err(io)? {
                list.push((Keyword::new(to.value()), record.count));
            }
        }
        rank_next_list(&mut list);
        Ok(list)
    }

    fn contains_keyword(&self, keyword: &Keyword) -> Result<bool, SearchGraphError> {
        Ok(self.keyword_cache.contains_key(keyword))
    }

    fn node_count(&self) -> Result<usize, SearchGraphError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(KEYWORDS).map_err(io)?;
        Ok(table.len().map_err(io)? as usize)
    }

    fn edge_count(&self, kind: EdgeKind) -> Result<usize, SearchGraphError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(edge_table(kind)).map_err(io)?;
        Ok(table.len().map_err(io)? as usize)
    }

    fn clear_all(&mut self) -> Result<(), SearchGraphError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        write_txn.delete_table(KEYWORDS).map_err(io)?;
        write_txn.delete_table(KEYWORD_INDEX).map_err(io)?;
        write_txn.delete_table(NEXT_EDGES).map_err(io)?;
        write_txn.delete_table(FAIL_EDGES).map_err(io)?;
        write_txn.delete_table(METADATA).map_err(io)?;
        Self::create_tables(&write_txn)?;
        write_txn.commit().map_err(io)?;

        self.keyword_cache.clear();
        self.next_node_id = 0;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::GraphStatus;
    use tempfile::tempdir;

    fn kw(s: &str) -> Keyword {
        Keyword::new(s)
    }

    #[test]
    fn merge_keyword_deduplicates() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbKeywordGraph::open(temp.path().join("test.redb")).expect("open db");

        let first = graph.merge_keyword(&kw("테라")).expect("merge");
        let second = graph.merge_keyword(&kw("테라")).expect("merge");

        assert_eq!(first, second);
        assert_eq!(graph.node_count().expect("count"), 1);
    }

    #[test]
    fn increment_edge_counts_up() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbKeywordGraph::open(temp.path().join("test.redb")).expect("open db");

        for expected in 1..=3u64 {
            let count = graph
                .increment_edge(EdgeKind::Next, &kw("a"), &kw("b"), None)
                .expect("increment");
            assert_eq!(count, EdgeCount::new(expected));
        }
        assert_eq!(graph.node_count().expect("count"), 2);
        assert_eq!(graph.edge_count(EdgeKind::Next).expect("count"), 1);
    }

    #[test]
    fn self_loop_is_ignored() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbKeywordGraph::open(temp.path().join("test.redb")).expect("open db");

        let count = graph
            .increment_edge(EdgeKind::FailNext, &kw("a"), &kw("a"), None)
            .expect("increment");

        assert_eq!(count.value(), 0);
        assert_eq!(graph.ping().expect("ping"), GraphStatus::default());
    }

    #[test]
    fn fail_edge_records_last_observed() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbKeywordGraph::open(temp.path().join("test.redb")).expect("open db");

        graph
            .increment_edge(EdgeKind::FailNext, &kw("a"), &kw("b"), Some("2024-12-01T10:00"))
            .expect("increment");
        graph
            .increment_edge(EdgeKind::FailNext, &kw("a"), &kw("b"), Some("2024-12-02T11:00"))
            .expect("increment");

        let record = graph
            .get_edge(EdgeKind::FailNext, &kw("a"), &kw("b"))
            .expect("get")
            .expect("edge");
        assert_eq!(record.count, EdgeCount::new(2));
        assert_eq!(record.last_observed.as_deref(), Some("2024-12-02T11:00"));
        assert!(graph
            .get_edge(EdgeKind::Next, &kw("a"), &kw("b"))
            .expect("get")
            .is_none());
    }

    #[test]
    fn next_list_ranked() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbKeywordGraph::open(temp.path().join("test.redb")).expect("open db");

        for to in ["c", "b", "b", "d", "d", "d"] {
            graph
                .increment_edge(EdgeKind::Next, &kw("a"), &kw(to), None)
                .expect("increment");
        }
        graph
            .increment_edge(EdgeKind::Next, &kw("b"), &kw("a"), None)
            .expect("increment");

        let list = graph.next_list(EdgeKind::Next, &kw("a")).expect("list");
        let flat: Vec<_> = list.iter().map(|(k, c)| (k.as_str(), c.value())).collect();
        assert_eq!(flat, vec![("d", 3), ("b", 2), ("c", 1)]);
    }

    #[test]
    fn recovery_persistence_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        // Phase 1: create data
        {
            let mut graph = RedbKeywordGraph::open(&db_path).expect("open db");
            graph
                .increment_edge(EdgeKind::Next, &kw("치킨"), &kw("닭고기"), None)
                .expect("increment");
            graph
                .increment_edge(EdgeKind::FailNext, &kw("닭고기"), &kw("튀김"), None)
                .expect("increment");
        }
        // Graph dropped here, simulating process exit

        // Phase 2: reopen, counts keep accumulating
        {
            let mut graph = RedbKeywordGraph::open(&db_path).expect("reopen db");
            assert_eq!(graph.node_count().expect("count"), 3);
            assert!(graph.contains_keyword(&kw("튀김")).expect("contains"));

            let count = graph
                .increment_edge(EdgeKind::Next, &kw("치킨"), &kw("닭고기"), None)
                .expect("increment");
            assert_eq!(count, EdgeCount::new(2));

            // No duplicate node after reopen
            graph.merge_keyword(&kw("치킨")).expect("merge");
            assert_eq!(graph.node_count().expect("count"), 3);
        }
    }

    #[test]
    fn recovery_next_node_id_preserved() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        let first = {
            let mut graph = RedbKeywordGraph::open(&db_path).expect("open db");
            graph.merge_keyword(&kw("a")).expect("merge")
        };
        let second = {
            let mut graph = RedbKeywordGraph::open(&db_path).expect("reopen db");
            graph.merge_keyword(&kw("b")).expect("merge")
        };

        assert_ne!(first, second);
    }

    #[test]
    fn clear_all_then_reuse() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbKeywordGraph::open(temp.path().join("test.redb")).expect("open db");

        graph
            .increment_edge(EdgeKind::Next, &kw("a"), &kw("b"), None)
            .expect("increment");
        graph.clear_all().expect("clear");

        assert_eq!(graph.ping().expect("ping"), GraphStatus::default());
        assert!(!graph.contains_keyword(&kw("a")).expect("contains"));

        let count = graph
            .increment_edge(EdgeKind::Next, &kw("a"), &kw("b"), None)
            .expect("increment");
        assert_eq!(count, EdgeCount::new(1));
    }

    #[test]
    fn edges_snapshot() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbKeywordGraph::open(temp.path().join("test.redb")).expect("open db");

        graph
            .increment_edge(EdgeKind::Next, &kw("a"), &kw("b"), None)
            .expect("increment");

        assert_eq!(graph.node_count().expect("count"), 2);

        let edges = graph.edges(EdgeKind::Next).expect("edges");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].0, kw("a"));
        assert_eq!(edges[0].1, kw("b"));
        assert_eq!(edges[0].2.count, EdgeCount::new(1));
    }

    #[test]
    fn compact_and_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut graph = RedbKeywordGraph::open(&db_path).expect("open db");
            graph
                .increment_edge(EdgeKind::Next, &kw("a"), &kw("b"), None)
                .expect("increment");
            graph.compact().expect("compact");
        }

        let graph = RedbKeywordGraph::open(&db_path).expect("reopen db");
        assert_eq!(graph.edge_count(EdgeKind::Next).expect("count"), 1);
    }
}
