//! # searchgraph-core
//!
//! The deterministic keyword graph engine for searchgraph - THE LOGIC.
//!
//! This crate turns time-ordered search events into a weighted graph of
//! keyword transitions (`NEXT`) and failure follow-ups (`FAIL_NEXT`), and
//! tallies the failure pairs for export.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is the ONLY place where graph state is held
//! - Is synchronous: every store call completes before the next event
//! - Has NO async, NO network dependencies (pure Rust)
//! - Never sorts input; callers hand it ordered sequences
//! - Never panics; every failure is a `SearchGraphError`

// =============================================================================
// MODULES
// =============================================================================

pub mod export;
pub mod extractor;
pub mod failure_pairs;
pub mod graph;
pub mod primitives;
pub mod session;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    EdgeCount, EdgeKind, EdgeRecord, GraphStatus, Identifier, IdentifierBucket, Keyword, NodeId,
    SearchEvent, SearchGraphError,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use export::{
    parse_identifiers, read_identifiers, render_failure_pairs, render_identifiers,
    write_failure_pairs, write_identifiers,
};
pub use extractor::{
    AlwaysFail, EngineState, ExtractionAborted, ExtractionReport, Extractor, FailurePredicate,
    FlaggedFailure,
};
pub use failure_pairs::{FailurePair, FailurePairTable};
pub use graph::{KeywordGraph, KeywordGraphStore, validate_keyword};
pub use session::Session;
pub use storage::RedbKeywordGraph;
