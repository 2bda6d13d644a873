//! # Failure-Pair Frequency Table
//!
//! In-memory tally of `(A, B)` failure pairs for one run.
//!
//! The table remembers the order in which each pair was first seen, so a
//! count-descending ranking can break ties by insertion history and stay
//! stable across identical runs.

use crate::Keyword;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An ordered failure pair: a failed search `failed` followed by `next`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FailurePair {
    pub failed: Keyword,
    pub next: Keyword,
}

impl FailurePair {
    #[must_use]
    pub fn new(failed: Keyword, next: Keyword) -> Self {
        Self { failed, next }
    }
}

/// Frequency table keyed by `FailurePair`, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailurePairTable {
    entries: Vec<(FailurePair, u64)>,
    index: BTreeMap<FailurePair, usize>,
}

impl FailurePairTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `by` to the count of `pair`, inserting it at the end when new.
    pub fn add(&mut self, pair: FailurePair, by: u64) {
        match self.index.get(&pair) {
            Some(&slot) => {
                if let Some(entry) = self.entries.get_mut(slot) {
                    entry.1 = entry.1.saturating_add(by);
                }
            }
            None => {
                self.index.insert(pair.clone(), self.entries.len());
                self.entries.push((pair, by));
            }
        }
    }

    /// Count one more occurrence of `pair`.
    pub fn increment(&mut self, pair: FailurePair) {
        self.add(pair, 1);
    }

    /// Point-wise sum: `self[k] += other[k]` for every key of `other`.
    ///
    /// Keys new to `self` are appended in `other`'s insertion order.
    pub fn merge(&mut self, other: &Self) {
        for (pair, count) in &other.entries {
            self.add(pair.clone(), *count);
        }
    }

    /// Current count of `pair`, 0 when absent.
    #[must_use]
    pub fn get(&self, pair: &FailurePair) -> u64 {
        self.index
            .get(pair)
            .and_then(|&slot| self.entries.get(slot))
            .map_or(0, |(_, count)| *count)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, (_, count)| acc.saturating_add(*count))
    }

    /// Entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&FailurePair, u64)> {
        self.entries.iter().map(|(pair, count)| (pair, *count))
    }

    /// Entries by descending count; equal counts keep insertion order.
    #[must_use]
    pub fn ranked(&self) -> Vec<(&FailurePair, u64)> {
        let mut rows: Vec<_> = self.iter().collect();
        // sort_by is stable
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }
}

impl FromIterator<FailurePair> for FailurePairTable {
    fn from_iter<I: IntoIterator<Item = FailurePair>>(iter: I) -> Self {
        let mut table = Self::new();
        for pair in iter {
            table.increment(pair);
        }
        table
    }
}
