//! # Partitioned Replay Driver
//!
//! Replays the search log one identifier at a time through the extraction
//! engine and merges the per-identifier failure-pair tables.
//!
//! - Identifiers come from a terms aggregation, an exported list file, or the caller
//! - Each identifier's sequence is fetched with a result ceiling and ascending order
//! - Up to `concurrency` identifiers are in flight at once
//! - A failing or timed-out identifier is logged and skipped; the replay goes on
//!
//! Each sequence is extracted while holding the store's write lock, with no
//! await point in between, so two sequences never interleave and a timeout
//! cannot cut one short.

use crate::logsource::{LogSource, StaticQuery, TimeWindow, parse_hits};
use futures::stream::{self, StreamExt};
use searchgraph_core::{
    ExtractionAborted, ExtractionReport, Extractor, FailurePairTable, FailurePredicate, Identifier,
    KeywordGraphStore, SearchGraphError, read_identifiers,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

// =============================================================================
// OPTIONS AND REPORTS
// =============================================================================

/// Tunables of one replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOptions {
    pub window: TimeWindow,
    /// Maximum events fetched for one identifier.
    pub result_ceiling: usize,
    /// Identifiers in flight at once. Zero is treated as one.
    pub concurrency: usize,
    pub identifier_timeout: Duration,
    /// Top-level document field holding the search record.
    pub key_field: String,
}

/// Where the population of identifiers comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierSource {
    /// Top-`size` identifiers by event count within the window.
    Aggregation { size: usize },
    /// A previously exported identifier-list file.
    ListFile(PathBuf),
    /// An explicit list.
    Given(Vec<Identifier>),
}

/// An identifier whose sequence could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedIdentifier {
    pub identifier: Identifier,
    pub reason: String,
}

/// Outcome of a partitioned replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Merged failure-pair table of every processed identifier.
    pub table: FailurePairTable,
    pub processed: Vec<Identifier>,
    pub skipped: Vec<SkippedIdentifier>,
    /// Includes the events a skipped identifier got through before its error.
    pub events_processed: u64,
    pub events_skipped: u64,
}

impl ReplayReport {
    fn absorb(
        &mut self,
        identifier: Identifier,
        outcome: Result<ExtractionReport, ExtractionAborted>,
    ) {
        match outcome {
            Ok(report) => {
                self.table.merge(&report.pairs);
                self.count_events(&report);
                self.processed.push(identifier);
            }
            Err(aborted) => {
                tracing::warn!(
                    identifier = %identifier,
                    error = %aborted.source,
                    events = aborted.report.events_processed,
                    "skipping identifier"
                );
                // Pairs of an aborted sequence stay out of the table.
                self.count_events(&aborted.report);
                self.skipped.push(SkippedIdentifier {
                    identifier,
                    reason: aborted.source.to_string(),
                });
            }
        }
    }

    fn count_events(&mut self, report: &ExtractionReport) {
        self.events_processed = self.events_processed.saturating_add(report.events_processed);
        self.events_skipped = self.events_skipped.saturating_add(report.events_skipped);
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// Drives the extraction engine over a log source into a shared graph store.
pub struct ReplayDriver<L, S, P> {
    source: Arc<L>,
    store: Arc<RwLock<S>>,
    extractor: Extractor<P>,
    options: ReplayOptions,
}

impl<L, S, P> ReplayDriver<L, S, P>
where
    L: LogSource,
    S: KeywordGraphStore + Send + Sync,
    P: FailurePredicate + Send + Sync,
{
    pub fn new(
        source: Arc<L>,
        store: Arc<RwLock<S>>,
        predicate: P,
        options: ReplayOptions,
    ) -> Self {
        Self {
            source,
            store,
            extractor: Extractor::new(predicate),
            options,
        }
    }

    /// Resolve the identifier population. Zero identifiers is not an error.
    pub async fn resolve_identifiers(
        &self,
        from: IdentifierSource,
    ) -> Result<Vec<Identifier>, SearchGraphError> {
        let identifiers = match from {
            IdentifierSource::Aggregation { size } => self
                .source
                .aggregate_identifiers(&self.options.window, size)
                .await?
                .into_iter()
                .map(|bucket| bucket.key)
                .collect(),
            IdentifierSource::ListFile(path) => read_identifiers(&path)?,
            IdentifierSource::Given(identifiers) => identifiers,
        };
        tracing::info!(count = identifiers.len(), "resolved identifiers");
        Ok(identifiers)
    }

    /// Replay every identifier and merge the results.
    ///
    /// Results are merged in input order regardless of completion order.
    pub async fn replay(&self, identifiers: &[Identifier]) -> ReplayReport {
        let concurrency = self.options.concurrency.max(1);
        tracing::info!(
            identifiers = identifiers.len(),
            concurrency,
            gte = %self.options.window.gte,
            lte = %self.options.window.lte,
            "replay started"
        );

        let outcomes: Vec<_> = stream::iter(identifiers.iter().cloned())
            .map(|identifier| async move {
                let outcome = self.process_identifier_with_timeout(&identifier).await;
                (identifier, outcome)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut report = ReplayReport::default();
        for (identifier, outcome) in outcomes {
            report.absorb(identifier, outcome);
        }

        tracing::info!(
            processed = report.processed.len(),
            skipped = report.skipped.len(),
            fail_pairs = report.table.len(),
            "replay finished"
        );
        report
    }

    /// Resolve then replay. Only resolution failures are returned as errors.
    pub async fn replay_from(
        &self,
        from: IdentifierSource,
    ) -> Result<ReplayReport, SearchGraphError> {
        let identifiers = self.resolve_identifiers(from).await?;
        Ok(self.replay(&identifiers).await)
    }

    /// Run a static query as one undifferentiated sequence.
    ///
    /// Store errors abort the run and are returned with the partial counts.
    pub async fn process_static(
        &self,
        query: &StaticQuery,
    ) -> Result<ExtractionReport, ExtractionAborted> {
        let hits = self.source.search_static(query).await?;
        tracing::info!(hits = hits.len(), "static query returned");

        let events = parse_hits(&hits, &self.options.key_field);
        let mut store = self.store.write().await;
        let report = self.extractor.process(&mut *store, &events)?;

        tracing::info!(
            events = report.events_processed,
            skipped = report.events_skipped,
            fail_pairs = report.pairs.len(),
            "static sequence processed"
        );
        Ok(report)
    }

    async fn process_identifier_with_timeout(
        &self,
        identifier: &Identifier,
    ) -> Result<ExtractionReport, ExtractionAborted> {
        let limit = self.options.identifier_timeout;
        tokio::time::timeout(limit, self.process_identifier(identifier))
            .await
            .map_err(|_| ExtractionAborted::from(SearchGraphError::Timeout(limit.as_secs())))?
    }

    async fn process_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<ExtractionReport, ExtractionAborted> {
        let hits = self
            .source
            .fetch_identifier_hits(identifier, &self.options.window, self.options.result_ceiling)
            .await?;
        let events = parse_hits(&hits, &self.options.key_field);

        let report = {
            let mut store = self.store.write().await;
            self.extractor.process(&mut *store, &events)?
        };

        tracing::info!(
            identifier = %identifier,
            hits = hits.len(),
            events = report.events_processed,
            fail_pairs = report.pairs.len(),
            "identifier processed"
        );
        if report.events_skipped > 0 {
            tracing::debug!(
                identifier = %identifier,
                skipped = report.events_skipped,
                "malformed hits skipped"
            );
        }
        Ok(report)
    }
}
