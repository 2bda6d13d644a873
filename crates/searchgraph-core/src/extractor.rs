//! # Extractor Module
//!
//! The transition and failure-pair extraction engine for searchgraph CORE.
//!
//! Walks one ordered sequence of `SearchEvent`s in a single forward pass and:
//! - Upserts every participating keyword as a node
//! - Upserts-or-increments a `NEXT` edge between consecutive keywords of the same day
//! - Upserts-or-increments a `FAIL_NEXT` edge from a pending failure to the event after it
//! - Tallies the failure pairs locally for export
//!
//! The engine never sorts. Callers hand it events already in timestamp order.
//!
//! ## Engine State
//!
//! All state lives in an `EngineState` created per call to `process` and
//! dropped when it returns. Two sequences never share a state instance, so
//! one `Extractor` can serve any number of concurrent sequences.

use crate::failure_pairs::{FailurePair, FailurePairTable};
use crate::graph::{KeywordGraphStore, validate_keyword};
use crate::{EdgeKind, Keyword, SearchEvent, SearchGraphError};

// =============================================================================
// FAILURE CLASSIFICATION
// =============================================================================

/// Decides whether an event counts as a failed search.
///
/// A failed event becomes the pending failure that the next event of the
/// same day is paired with.
pub trait FailurePredicate {
    fn is_failure(&self, event: &SearchEvent) -> bool;
}

/// Every event is classified as a failure.
///
/// This is the current production policy: a real result-count signal is
/// not yet trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysFail;

impl FailurePredicate for AlwaysFail {
    fn is_failure(&self, _event: &SearchEvent) -> bool {
        true
    }
}

/// Trusts the failure flag set on the event by the boundary parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlaggedFailure;

impl FailurePredicate for FlaggedFailure {
    fn is_failure(&self, event: &SearchEvent) -> bool {
        event.is_failure
    }
}

impl<F> FailurePredicate for F
where
    F: Fn(&SearchEvent) -> bool,
{
    fn is_failure(&self, event: &SearchEvent) -> bool {
        self(event)
    }
}

// =============================================================================
// EXTRACTION REPORT
// =============================================================================

/// What one `process` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Failure pairs seen in this sequence.
    pub pairs: FailurePairTable,
    /// Events that took part in extraction.
    pub events_processed: u64,
    /// Malformed events skipped without touching state.
    pub events_skipped: u64,
    /// `NEXT` increments issued.
    pub transitions: u64,
}

/// A sequence stopped by a store error, with the counts reached before it.
///
/// Upserts issued before the failure stay in the store. The `pairs` of the
/// partial report are not meant for export.
#[derive(Debug, thiserror::Error)]
#[error(
    "{source} (after {} events, {} skipped)",
    .report.events_processed,
    .report.events_skipped
)]
pub struct ExtractionAborted {
    pub report: ExtractionReport,
    pub source: SearchGraphError,
}

impl ExtractionAborted {
    #[must_use]
    pub fn new(report: ExtractionReport, source: SearchGraphError) -> Self {
        Self { report, source }
    }
}

/// An error raised before any event was processed.
impl From<SearchGraphError> for ExtractionAborted {
    fn from(source: SearchGraphError) -> Self {
        Self::new(ExtractionReport::default(), source)
    }
}

impl From<ExtractionAborted> for SearchGraphError {
    fn from(aborted: ExtractionAborted) -> Self {
        aborted.source
    }
}

impl ExtractionReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: &Self) {
        self.pairs.merge(&other.pairs);
        self.events_processed = self.events_processed.saturating_add(other.events_processed);
        self.events_skipped = self.events_skipped.saturating_add(other.events_skipped);
        self.transitions = self.transitions.saturating_add(other.transitions);
    }
}

// =============================================================================
// ENGINE STATE
// =============================================================================

/// Per-sequence state of the extraction state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineState {
    previous_keyword: Option<Keyword>,
    previous_day: Option<String>,
    pending_failure: Option<Keyword>,
}

impl EngineState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The keyword of the last participating event.
    #[must_use]
    pub fn previous_keyword(&self) -> Option<&Keyword> {
        self.previous_keyword.as_ref()
    }

    /// The failure keyword still waiting for a follow-up.
    #[must_use]
    pub fn pending_failure(&self) -> Option<&Keyword> {
        self.pending_failure.as_ref()
    }

    /// Feed one event through the state machine.
    ///
    /// Returns `Ok(false)` when the event was skipped as malformed.
    pub fn step<S, P>(
        &mut self,
        event: &SearchEvent,
        store: &mut S,
        predicate: &P,
        report: &mut ExtractionReport,
    ) -> Result<bool, SearchGraphError>
    where
        S: KeywordGraphStore + ?Sized,
        P: FailurePredicate + ?Sized,
    {
        let keyword = &event.keyword;
        let day = match event.day() {
            Some(day) if !keyword.is_empty() && validate_keyword(keyword).is_ok() => day,
            _ => {
                report.events_skipped = report.events_skipped.saturating_add(1);
                return Ok(false);
            }
        };

        // Day boundary: nothing carries over into a new day.
        if self.previous_day.as_deref().is_some_and(|prev| prev != day) {
            self.previous_keyword = None;
            self.pending_failure = None;
        }

        store.merge_keyword(keyword)?;

        let same_day = self.previous_day.as_deref() == Some(day);
        let previous = self
            .previous_keyword
            .as_ref()
            .filter(|p| same_day && *p != keyword);
        if let Some(previous) = previous {
            store.increment_edge(EdgeKind::Next, previous, keyword, None)?;
            report.transitions = report.transitions.saturating_add(1);
        }

        // Single use: taken here, possibly re-armed below.
        if let Some(pending) = self.pending_failure.take().filter(|p| p != keyword) {
            store.increment_edge(
                EdgeKind::FailNext,
                &pending,
                keyword,
                Some(event.timestamp.as_str()),
            )?;
            report.pairs.increment(FailurePair::new(pending, keyword.clone()));
        }

        self.pending_failure = predicate.is_failure(event).then(|| keyword.clone());
        self.previous_keyword = Some(keyword.clone());
        self.previous_day = Some(day.to_string());

        report.events_processed = report.events_processed.saturating_add(1);
        Ok(true)
    }
}

// =============================================================================
// EXTRACTOR
// =============================================================================

/// The extraction engine, parameterized by its failure predicate.
#[derive(Debug, Clone, Default)]
pub struct Extractor<P = AlwaysFail> {
    predicate: P,
}

impl<P: FailurePredicate> Extractor<P> {
    /// Create an extractor with the given failure predicate.
    #[must_use]
    pub fn new(predicate: P) -> Self {
        Self { predicate }
    }

    /// Process one ordered sequence against a graph store.
    ///
    /// Store upserts are issued as the sequence is walked, not batched.
    /// Malformed events are skipped and counted. The first store error
    /// aborts the sequence and is returned with the counts reached so far;
    /// upserts already issued stay.
    pub fn process<S>(
        &self,
        store: &mut S,
        events: &[SearchEvent],
    ) -> Result<ExtractionReport, ExtractionAborted>
    where
        S: KeywordGraphStore + ?Sized,
    {
        let mut state = EngineState::new();
        let mut report = ExtractionReport::default();
        for event in events {
            if let Err(source) = state.step(event, store, &self.predicate, &mut report) {
                return Err(ExtractionAborted::new(report, source));
            }
        }
        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================
