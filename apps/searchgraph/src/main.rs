//! # searchgraph
//!
//! The main binary for the searchgraph keyword graph builder.
//!
//! This application provides:
//! - Replay modes that pull search logs and build the keyword graph
//! - CSV export of identifier lists and failure-pair candidates
//! - HTTP REST API over the graph (axum-based)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  apps/searchgraph (THE BINARY)                  │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   HTTP API  │    │  Replay Driver   │     │
//! │  │  (clap)     │    │   (axum)    │    │ (tokio, reqwest) │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                   ┌──────────────────┐                          │
//! │                   │ searchgraph-core │                          │
//! │                   │   (THE LOGIC)    │                          │
//! │                   └──────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Export the top identifiers, then replay each of them
//! searchgraph export-pcid --gte 2024-12-01T00:00:00.000 --size 100
//! searchgraph process-all-pcids --concurrency 8
//!
//! # Inspect the graph
//! searchgraph status
//! searchgraph next "winter boots" --fail
//! ```

use clap::Parser;
use searchgraph::cli;
use searchgraph::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    let config = AppConfig::load(cli.config.as_deref());

    // RUST_LOG wins over the configured level
    let default_filter = config
        .as_ref()
        .map(AppConfig::log_filter)
        .unwrap_or_else(|_| "searchgraph=info,tower_http=info".to_string());
    init_tracing(default_filter);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli, config).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// SEARCHGRAPH_LOG_FORMAT=json enables machine-parseable output.
fn init_tracing(default_filter: String) {
    let log_format =
        std::env::var("SEARCHGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

fn print_banner() {
    println!("searchgraph v{}", env!("CARGO_PKG_VERSION"));
    println!();
}
