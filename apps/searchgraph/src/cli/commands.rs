//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use crate::config::{AppConfig, GraphBackend, GraphConfig};
use crate::logsource::{ElasticLogSource, LogSource, StaticQuery, TimeWindow};
use crate::replay::{IdentifierSource, ReplayDriver, ReplayOptions, ReplayReport};
use searchgraph_core::{
    EdgeKind, ExtractionReport, Keyword, KeywordGraphStore, SearchGraphError, Session,
    write_failure_pairs, write_identifiers,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

// =============================================================================
// PROCESS COMMAND
// =============================================================================

/// Run the static query as one sequence and export its failure pairs.
pub async fn cmd_process(config: &AppConfig, json_mode: bool) -> Result<(), SearchGraphError> {
    config.validate()?;
    let query = StaticQuery::from_file(&config.elasticsearch.query_file)?;
    let source = Arc::new(ElasticLogSource::new(&config.elasticsearch)?);
    let store = Arc::new(RwLock::new(load_or_create_session(&config.graph)?));

    log_store_status(&store).await?;

    let driver = ReplayDriver::new(
        source,
        Arc::clone(&store),
        config.replay.failure_policy,
        replay_options(config),
    );
    let report = match driver.process_static(&query).await {
        Ok(report) => report,
        Err(aborted) => {
            // No CSV for an aborted run, but the counts are still reported
            println!("{}", render_process_summary(&aborted.report, None, json_mode));
            return Err(aborted.source);
        }
    };

    let csv_path = &config.replay.fail_pair_csv_path;
    write_failure_pairs(csv_path, &report.pairs)?;
    tracing::info!(path = %csv_path.display(), rows = report.pairs.len(), "fail pair csv written");

    println!("{}", render_process_summary(&report, Some(csv_path), json_mode));

    log_store_status(&store).await
}

/// Summary of a static run. `output` is `None` when the run was aborted.
fn render_process_summary(
    report: &ExtractionReport,
    output: Option<&Path>,
    json_mode: bool,
) -> String {
    if json_mode {
        let summary = serde_json::json!({
            "completed": output.is_some(),
            "events_processed": report.events_processed,
            "events_skipped": report.events_skipped,
            "transitions": report.transitions,
            "fail_pairs": report.pairs.len(),
            "output": output.map(|path| path.to_string_lossy()),
        });
        return serde_json::to_string_pretty(&summary).unwrap_or_default();
    }

    let mut lines = vec![
        format!(
            "Processed {} events ({} skipped)",
            report.events_processed, report.events_skipped
        ),
        format!("Transitions: {}", report.transitions),
    ];
    match output {
        Some(path) => lines.push(format!(
            "Fail pairs:  {} -> {}",
            report.pairs.len(),
            path.display()
        )),
        None => lines.push("Fail pairs:  not exported, run aborted".to_string()),
    }
    lines.join("\n")
}

// =============================================================================
// EXPORT-PCID COMMAND
// =============================================================================

/// Aggregate the most active identifiers and write the identifier list.
pub async fn cmd_export_pcid(config: &AppConfig, json_mode: bool) -> Result<(), SearchGraphError> {
    config.validate()?;
    let source = ElasticLogSource::new(&config.elasticsearch)?;
    let window = TimeWindow::new(&config.replay.gte, &config.replay.lte);

    let buckets = source
        .aggregate_identifiers(&window, config.replay.aggregation_size)
        .await?;

    let path = &config.replay.identifier_list_path;
    write_identifiers(path, &buckets)?;
    tracing::info!(path = %path.display(), identifiers = buckets.len(), "identifier list written");

    if json_mode {
        let output = serde_json::json!({
            "identifiers": buckets.len(),
            "output": path.to_string_lossy(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!("Exported {} identifiers to {}", buckets.len(), path.display());
    }
    Ok(())
}

// =============================================================================
// PROCESS-ALL-PCIDS COMMAND
// =============================================================================

/// Replay every identifier and export the merged failure pairs.
pub async fn cmd_process_all_pcids(
    config: &AppConfig,
    from_aggregation: bool,
    json_mode: bool,
) -> Result<(), SearchGraphError> {
    config.validate()?;
    let source = Arc::new(ElasticLogSource::new(&config.elasticsearch)?);
    let store = Arc::new(RwLock::new(load_or_create_session(&config.graph)?));

    log_store_status(&store).await?;

    let identifiers = if from_aggregation {
        IdentifierSource::Aggregation {
            size: config.replay.aggregation_size,
        }
    } else {
        IdentifierSource::ListFile(config.replay.identifier_list_path.clone())
    };

    let driver = ReplayDriver::new(
        source,
        Arc::clone(&store),
        config.replay.failure_policy,
        replay_options(config),
    );
    let report = driver.replay_from(identifiers).await?;

    // The summary is printed even if the export below fails
    println!("{}", render_replay_summary(&report, json_mode));

    let csv_path = &config.replay.fail_pair_csv_path;
    write_failure_pairs(csv_path, &report.table)?;
    tracing::info!(path = %csv_path.display(), rows = report.table.len(), "fail pair csv written");

    log_store_status(&store).await
}

fn render_replay_summary(report: &ReplayReport, json_mode: bool) -> String {
    if json_mode {
        let skipped: Vec<_> = report
            .skipped
            .iter()
            .map(|s| serde_json::json!({ "identifier": s.identifier.as_str(), "reason": s.reason }))
            .collect();
        let output = serde_json::json!({
            "processed": report.processed.len(),
            "skipped": skipped,
            "events_processed": report.events_processed,
            "events_skipped": report.events_skipped,
            "fail_pairs": report.table.len(),
        });
        return serde_json::to_string_pretty(&output).unwrap_or_default();
    }

    let mut lines = vec![
        "Replay Summary".to_string(),
        "==============".to_string(),
        format!("Identifiers processed: {}", report.processed.len()),
        format!("Identifiers skipped:   {}", report.skipped.len()),
    ];
    for skipped in &report.skipped {
        lines.push(format!("  {} ({})", skipped.identifier, skipped.reason));
    }
    lines.push(format!("Events processed:      {}", report.events_processed));
    lines.push(format!("Events skipped:        {}", report.events_skipped));
    lines.push(format!("Fail pairs:            {}", report.table.len()));
    lines.join("\n")
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show graph status.
pub fn cmd_status(config: &AppConfig, json_mode: bool) -> Result<(), SearchGraphError> {
    let session = load_or_create_session(&config.graph)?;
    let status = session.ping()?;

    if json_mode {
        let output = serde_json::json!({
            "database": config.graph.path.to_string_lossy(),
            "backend": backend_name(config.graph.backend),
            "node_count": status.node_count,
            "next_edge_count": status.next_edge_count,
            "fail_edge_count": status.fail_edge_count,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("searchgraph Status");
    println!("==================");
    println!("Database: {}", config.graph.path.display());
    println!("Backend:  {}", backend_name(config.graph.backend));
    println!();
    println!("Keywords:        {}", status.node_count);
    println!("NEXT edges:      {}", status.next_edge_count);
    println!("FAIL_NEXT edges: {}", status.fail_edge_count);

    Ok(())
}

// =============================================================================
// NEXT COMMAND
// =============================================================================

/// List the outgoing edges of a keyword, most frequent first.
pub fn cmd_next(
    config: &AppConfig,
    keyword: &str,
    fail: bool,
    json_mode: bool,
) -> Result<(), SearchGraphError> {
    let session = load_or_create_session(&config.graph)?;
    let keyword = Keyword::new(keyword);
    let kind = if fail { EdgeKind::FailNext } else { EdgeKind::Next };

    if !session.contains_keyword(&keyword)? {
        return Err(SearchGraphError::KeywordNotFound(keyword.to_string()));
    }
    let list = session.next_list(kind, &keyword)?;

    if json_mode {
        let output = api::NextListResponse::new(&keyword, kind, list);
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("{} -[{}]->", keyword, kind);
    if list.is_empty() {
        println!("  (no edges)");
    }
    for (next, count) in &list {
        println!("  {} ({})", next, count.value());
    }
    Ok(())
}

// =============================================================================
// CLEAR COMMAND
// =============================================================================

/// Delete every node and edge, then compact the database.
pub fn cmd_clear(config: &AppConfig, yes: bool) -> Result<(), SearchGraphError> {
    if !yes {
        return Err(SearchGraphError::ConfigError(
            "refusing to clear the graph without --yes".to_string(),
        ));
    }

    let mut session = load_or_create_session(&config.graph)?;
    session.clear_all()?;
    session.compact()?;
    tracing::info!(path = %config.graph.path.display(), "graph cleared");

    println!("Cleared graph at {}", config.graph.path.display());
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &AppConfig, host: &str, port: u16) -> Result<(), SearchGraphError> {
    let session = load_or_create_session(&config.graph)?;

    println!("searchgraph Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", backend_name(config.graph.backend));
    println!("  Database: {}", config.graph.path.display());
    println!();
    println!("Endpoints:");
    println!("  GET  /health              - Health check");
    println!("  GET  /status              - Node and edge counts");
    println!("  POST /next                - Record a transition");
    println!("  GET  /next/{{keyword}}      - NEXT edges of a keyword");
    println!("  GET  /fail-next/{{keyword}} - FAIL_NEXT edges of a keyword");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, session).await
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured graph store.
pub fn load_or_create_session(config: &GraphConfig) -> Result<Session, SearchGraphError> {
    match config.backend {
        GraphBackend::Redb => {
            if config.path.as_os_str().is_empty() {
                return Err(SearchGraphError::ConfigError(
                    "graph.path cannot be empty for the redb backend".to_string(),
                ));
            }
            Session::with_redb(&config.path)
        }
        GraphBackend::Memory => Ok(Session::new()),
    }
}

/// Replay tunables derived from the configuration.
#[must_use]
pub fn replay_options(config: &AppConfig) -> ReplayOptions {
    ReplayOptions {
        window: TimeWindow::new(&config.replay.gte, &config.replay.lte),
        result_ceiling: config.replay.result_ceiling,
        concurrency: config.replay.concurrency,
        identifier_timeout: Duration::from_secs(config.replay.identifier_timeout_secs),
        key_field: config.elasticsearch.key_field.clone(),
    }
}

fn backend_name(backend: GraphBackend) -> &'static str {
    match backend {
        GraphBackend::Redb => "redb",
        GraphBackend::Memory => "memory",
    }
}

/// Connectivity test, logged before and after every write run.
async fn log_store_status(store: &RwLock<Session>) -> Result<(), SearchGraphError> {
    let status = store.read().await.ping()?;
    tracing::info!(
        nodes = status.node_count,
        next_edges = status.next_edge_count,
        fail_edges = status.fail_edge_count,
        "graph store reachable"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::SkippedIdentifier;
    use searchgraph_core::Identifier;

    fn partial_report() -> ExtractionReport {
        ExtractionReport {
            events_processed: 3,
            events_skipped: 1,
            transitions: 2,
            ..ExtractionReport::default()
        }
    }

    #[test]
    fn aborted_process_summary_keeps_counts() {
        let text = render_process_summary(&partial_report(), None, false);
        assert!(text.contains("Processed 3 events (1 skipped)"));
        assert!(text.contains("Transitions: 2"));
        assert!(text.contains("not exported"));

        let json: serde_json::Value =
            serde_json::from_str(&render_process_summary(&partial_report(), None, true))
                .expect("json summary");
        assert_eq!(json["completed"], false);
        assert_eq!(json["events_processed"], 3);
        assert_eq!(json["events_skipped"], 1);
        assert!(json["output"].is_null());
    }

    #[test]
    fn completed_process_summary_names_output() {
        let path = Path::new("result/fail_pair_candidates.csv");
        let json: serde_json::Value =
            serde_json::from_str(&render_process_summary(&partial_report(), Some(path), true))
                .expect("json summary");
        assert_eq!(json["completed"], true);
        assert_eq!(json["output"], "result/fail_pair_candidates.csv");
    }

    #[test]
    fn replay_summary_text_reports_skipped_events() {
        let report = ReplayReport {
            processed: vec![Identifier::new("u1")],
            skipped: vec![SkippedIdentifier {
                identifier: Identifier::new("u2"),
                reason: "Timed out after 5s".to_string(),
            }],
            events_processed: 7,
            events_skipped: 2,
            ..ReplayReport::default()
        };

        let text = render_replay_summary(&report, false);
        assert!(text.contains("Events processed:      7"));
        assert!(text.contains("Events skipped:        2"));
        assert!(text.contains("u2 (Timed out after 5s)"));
    }

    #[test]
    fn replay_options_follow_config() {
        let mut config = AppConfig::default();
        config.replay.concurrency = 6;
        config.replay.identifier_timeout_secs = 30;

        let options = replay_options(&config);
        assert_eq!(options.concurrency, 6);
        assert_eq!(options.identifier_timeout, Duration::from_secs(30));
        assert_eq!(options.result_ceiling, 10_000);
        assert_eq!(options.key_field, "query_log");
        assert_eq!(options.window.gte, "2024-12-01T00:00:00.000");
    }

    #[test]
    fn empty_redb_path_is_rejected() {
        let config = GraphConfig {
            backend: GraphBackend::Redb,
            path: std::path::PathBuf::new(),
        };
        assert!(matches!(
            load_or_create_session(&config),
            Err(SearchGraphError::ConfigError(_))
        ));
    }

    #[test]
    fn clear_requires_confirmation() {
        let mut config = AppConfig::default();
        config.graph.backend = GraphBackend::Memory;
        assert!(cmd_clear(&config, false).is_err());
        assert!(cmd_clear(&config, true).is_ok());
    }

    #[test]
    fn next_on_unknown_keyword_fails() {
        let mut config = AppConfig::default();
        config.graph.backend = GraphBackend::Memory;
        assert!(matches!(
            cmd_next(&config, "nothing", false, true),
            Err(SearchGraphError::KeywordNotFound(_))
        ));
    }

    #[test]
    fn redb_session_persists_between_opens() {
        let temp = tempfile::tempdir().expect("temp dir");
        let config = GraphConfig {
            backend: GraphBackend::Redb,
            path: temp.path().join("graph.redb"),
        };

        {
            let mut session = load_or_create_session(&config).expect("open");
            session
                .increment_edge(EdgeKind::Next, &Keyword::new("a"), &Keyword::new("b"), None)
                .expect("increment");
        }

        let session = load_or_create_session(&config).expect("reopen");
        assert_eq!(session.node_count().expect("count"), 2);
    }
}
