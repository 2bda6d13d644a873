//! # Property-Based Tests
//!
//! These tests check the extraction engine against a direct model of the
//! day-chained transition rules, across random ordered sequences.

use proptest::collection::vec;
use proptest::prelude::*;
use searchgraph_core::{
    AlwaysFail, EdgeKind, Extractor, FailurePair, FailurePairTable, Keyword, KeywordGraph,
    KeywordGraphStore, RedbKeywordGraph, SearchEvent,
};
use std::collections::{BTreeMap, BTreeSet};

/// Build an ordered sequence from (keyword index, day index) pairs.
///
/// Days are sorted so the sequence respects timestamp order.
fn sequence(raw: &[(u8, u8)]) -> Vec<SearchEvent> {
    let mut raw = raw.to_vec();
    raw.sort_by_key(|&(_, day)| day);
    raw.iter()
        .map(|&(k, day)| {
            SearchEvent::new(format!("kw{k}"), format!("2024-12-{:02}T10:00", day + 1))
        })
        .collect()
}

/// Count every adjacent, same-day, differing-keyword pair.
fn model_transitions(events: &[SearchEvent]) -> BTreeMap<(Keyword, Keyword), u64> {
    let mut expected = BTreeMap::new();
    for pair in events.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.day() == b.day() && a.keyword != b.keyword {
            *expected
                .entry((a.keyword.clone(), b.keyword.clone()))
                .or_insert(0u64) += 1;
        }
    }
    expected
}

fn graph_edges(graph: &KeywordGraph, kind: EdgeKind) -> BTreeMap<(Keyword, Keyword), u64> {
    graph
        .edges(kind)
        .map(|(a, b, record)| ((a.clone(), b.clone()), record.count.value()))
        .collect()
}

proptest! {
    /// NEXT edges are exactly the adjacent same-day keyword changes.
    #[test]
    fn transitions_match_model(raw in vec((0u8..6, 0u8..3), 0..60)) {
        let events = sequence(&raw);
        let mut graph = KeywordGraph::new();
        Extractor::new(AlwaysFail).process(&mut graph, &events).expect("process");

        prop_assert_eq!(graph_edges(&graph, EdgeKind::Next), model_transitions(&events));
    }

    /// When every event is a failure, each transition is also a failure pair.
    #[test]
    fn always_fail_pairs_mirror_transitions(raw in vec((0u8..6, 0u8..3), 0..60)) {
        let events = sequence(&raw);
        let mut graph = KeywordGraph::new();
        let report = Extractor::new(AlwaysFail).process(&mut graph, &events).expect("process");

        let table: BTreeMap<(Keyword, Keyword), u64> = report
            .pairs
            .iter()
            .map(|(p, c)| ((p.failed.clone(), p.next.clone()), c))
            .collect();
        prop_assert_eq!(&table, &model_transitions(&events));
        prop_assert_eq!(&graph_edges(&graph, EdgeKind::FailNext), &table);
    }

    /// A predicate that never fires produces no failure pairs at all.
    #[test]
    fn no_failures_no_pairs(raw in vec((0u8..6, 0u8..3), 0..60)) {
        let events = sequence(&raw);
        let mut graph = KeywordGraph::new();
        let report = Extractor::new(|_: &SearchEvent| false)
            .process(&mut graph, &events)
            .expect("process");

        prop_assert!(report.pairs.is_empty());
        prop_assert_eq!(graph.edge_count(EdgeKind::FailNext).expect("count"), 0);
    }

    /// One node per distinct keyword, never more.
    #[test]
    fn node_count_reflects_unique_keywords(raw in vec((0u8..20, 0u8..3), 0..80)) {
        let events = sequence(&raw);
        let mut graph = KeywordGraph::new();
        Extractor::new(AlwaysFail).process(&mut graph, &events).expect("process");

        let unique: BTreeSet<_> = events.iter().map(|e| e.keyword.clone()).collect();
        prop_assert_eq!(graph.node_count().expect("count"), unique.len());
    }

    /// No edge of either kind is a self-loop.
    #[test]
    fn no_self_loops(raw in vec((0u8..3, 0u8..2), 0..60)) {
        let events = sequence(&raw);
        let mut graph = KeywordGraph::new();
        Extractor::new(AlwaysFail).process(&mut graph, &events).expect("process");

        for kind in [EdgeKind::Next, EdgeKind::FailNext] {
            for (a, b, _) in graph.edges(kind) {
                prop_assert_ne!(a, b);
            }
        }
    }

    /// Merging per-sequence tables in any order yields the same counts.
    #[test]
    fn merge_is_order_independent(
        left in vec((0u8..4, 0u8..4), 0..30),
        right in vec((0u8..4, 0u8..4), 0..30),
    ) {
        let to_table = |raw: &[(u8, u8)]| -> FailurePairTable {
            raw.iter()
                .map(|&(a, b)| {
                    FailurePair::new(Keyword::new(format!("k{a}")), Keyword::new(format!("k{b}")))
                })
                .collect()
        };
        let (l, r) = (to_table(&left), to_table(&right));

        let mut lr = FailurePairTable::new();
        lr.merge(&l);
        lr.merge(&r);
        let mut rl = FailurePairTable::new();
        rl.merge(&r);
        rl.merge(&l);

        prop_assert_eq!(lr.len(), rl.len());
        prop_assert_eq!(lr.total(), l.total() + r.total());
        for (pair, count) in lr.iter() {
            prop_assert_eq!(rl.get(pair), count);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// The redb store ends up with the same edges as the in-memory store.
    #[test]
    fn redb_matches_in_memory(raw in vec((0u8..5, 0u8..2), 0..30)) {
        let events = sequence(&raw);
        let extractor = Extractor::new(AlwaysFail);

        let mut memory = KeywordGraph::new();
        extractor.process(&mut memory, &events).expect("process");

        let temp = tempfile::tempdir().expect("temp dir");
        let mut redb = RedbKeywordGraph::open(temp.path().join("prop.redb")).expect("open");
        extractor.process(&mut redb, &events).expect("process");

        for kind in [EdgeKind::Next, EdgeKind::FailNext] {
            let persisted: BTreeMap<(Keyword, Keyword), u64> = redb
                .edges(kind)
                .expect("edges")
                .into_iter()
                .map(|(a, b, record)| ((a, b), record.count.value()))
                .collect();
            prop_assert_eq!(persisted, graph_edges(&memory, kind));
        }
        prop_assert_eq!(redb.ping().expect("ping"), memory.ping().expect("ping"));
    }
}
