//! # Primitives
//!
//! Hardcoded runtime constants for the searchgraph CORE.
//!
//! These are compiled into the binary and are immutable at runtime.
//! Anything an operator may want to tune lives in the app configuration
//! instead; the values below are the defaults it falls back to.

/// Number of leading timestamp characters that form the calendar-day key.
///
/// `2024-12-03T10:22:01.000` -> `2024-12-03`.
/// Two events belong to the same day chain only if these keys are equal.
pub const DAY_KEY_LEN: usize = 10;

/// Maximum byte length of a keyword.
///
/// Longer search queries are treated as malformed records and skipped.
pub const MAX_KEYWORD_LENGTH: usize = 256;

/// Default result-count ceiling for one identifier's event sequence,
/// and the default `size` of a static query file.
pub const DEFAULT_RESULT_CEILING: usize = 10_000;

/// Default number of identifiers returned by a terms aggregation.
pub const DEFAULT_AGGREGATION_SIZE: usize = 10;

// =============================================================================
// EXPORT FORMAT
// =============================================================================

/// Header row of the failure-pair CSV.
pub const FAIL_PAIR_HEADER: &str = "A,B,pair_count";

/// Header row of the identifier-list CSV.
pub const IDENTIFIER_HEADER: &str = "user_pcid,doc_count";

/// Name of the identifier column in the identifier-list CSV.
pub const IDENTIFIER_COLUMN: &str = "user_pcid";
