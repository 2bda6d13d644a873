//! # searchgraph CLI Module
//!
//! This module implements the CLI interface for searchgraph.
//!
//! ## Available Commands
//!
//! - `process` - Run the static query file as one sequence (default)
//! - `export-pcid` - Aggregate identifiers and write the identifier list
//! - `process-all-pcids` - Replay every identifier and write failure pairs
//! - `status` - Show graph status
//! - `next` - List outgoing edges of a keyword
//! - `clear` - Delete every node and edge
//! - `server` - Start the HTTP server

mod commands;

use crate::config::{AppConfig, GraphBackend};
use clap::{Args, Parser, Subcommand};
use searchgraph_core::SearchGraphError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// searchgraph - search log keyword graph builder
///
/// Replays search logs into a graph of keyword transitions and exports
/// the search-failure follow-up pairs.
#[derive(Parser, Debug)]
#[command(name = "searchgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the graph database (overrides graph.path)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Time window overrides shared by the replay modes.
#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    /// Window start, inclusive (e.g. 2024-12-01T00:00:00.000)
    #[arg(long)]
    pub gte: Option<String>,

    /// Window end, inclusive (e.g. 2025-01-01T00:00:00.000)
    #[arg(long)]
    pub lte: Option<String>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the static query file over the whole index as one sequence
    Process {
        /// Query file (overrides elasticsearch.query_file)
        #[arg(long)]
        query_file: Option<PathBuf>,

        /// Failure-pair CSV output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Aggregate the most active identifiers and write them to CSV
    ExportPcid {
        #[command(flatten)]
        window: WindowArgs,

        /// Number of identifiers to keep
        #[arg(long)]
        size: Option<usize>,

        /// Identifier-list CSV output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay every identifier and write the merged failure pairs
    ProcessAllPcids {
        #[command(flatten)]
        window: WindowArgs,

        /// Identifier-list CSV to read (overrides replay.identifier_list_path)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Resolve identifiers with a live aggregation instead of a list file
        #[arg(long)]
        from_aggregation: bool,

        /// Maximum events fetched per identifier
        #[arg(long)]
        size: Option<usize>,

        /// Identifiers processed concurrently
        #[arg(long)]
        concurrency: Option<usize>,

        /// Failure-pair CSV output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show graph status
    Status,

    /// List the outgoing edges of a keyword
    Next {
        /// Keyword to look up
        keyword: String,

        /// List FAIL_NEXT edges instead of NEXT
        #[arg(long)]
        fail: bool,
    },

    /// Delete every node and edge
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Apply the global flags that override configuration values.
pub fn apply_global_overrides(cli: &Cli, config: &mut AppConfig) -> Result<(), SearchGraphError> {
    if let Some(database) = &cli.database {
        config.graph.path = database.clone();
    }
    if let Some(backend) = &cli.backend {
        config.graph.backend = backend.parse::<GraphBackend>()?;
    }
    Ok(())
}

fn apply_window(window: WindowArgs, config: &mut AppConfig) {
    if let Some(gte) = window.gte {
        config.replay.gte = gte;
    }
    if let Some(lte) = window.lte {
        config.replay.lte = lte;
    }
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli, mut config: AppConfig) -> Result<(), SearchGraphError> {
    apply_global_overrides(&cli, &mut config)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Process { query_file, output }) => {
            if let Some(query_file) = query_file {
                config.elasticsearch.query_file = query_file;
            }
            if let Some(output) = output {
                config.replay.fail_pair_csv_path = output;
            }
            cmd_process(&config, json_mode).await
        }
        Some(Commands::ExportPcid {
            window,
            size,
            output,
        }) => {
            apply_window(window, &mut config);
            if let Some(size) = size {
                config.replay.aggregation_size = size;
            }
            if let Some(output) = output {
                config.replay.identifier_list_path = output;
            }
            cmd_export_pcid(&config, json_mode).await
        }
        Some(Commands::ProcessAllPcids {
            window,
            input,
            from_aggregation,
            size,
            concurrency,
            output,
        }) => {
            apply_window(window, &mut config);
            if let Some(input) = input {
                config.replay.identifier_list_path = input;
            }
            if let Some(size) = size {
                config.replay.result_ceiling = size;
            }
            if let Some(concurrency) = concurrency {
                config.replay.concurrency = concurrency;
            }
            if let Some(output) = output {
                config.replay.fail_pair_csv_path = output;
            }
            cmd_process_all_pcids(&config, from_aggregation, json_mode).await
        }
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::Next { keyword, fail }) => cmd_next(&config, &keyword, fail, json_mode),
        Some(Commands::Clear { yes }) => cmd_clear(&config, yes),
        Some(Commands::Server { host, port }) => cmd_server(&config, &host, port).await,
        None => {
            // No subcommand - run the static query by default
            cmd_process(&config, json_mode).await
        }
    }
}
