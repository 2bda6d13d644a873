//! # Persistent Storage
//!
//! Disk-backed implementations of `KeywordGraphStore`.

mod redb_graph;

pub use redb_graph::RedbKeywordGraph;
