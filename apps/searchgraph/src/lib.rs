//! # searchgraph
//!
//! The async shell around `searchgraph-core`: the log source client, the
//! partitioned replay driver, configuration, the CLI and the HTTP facade.

pub mod api;
pub mod cli;
pub mod config;
pub mod logsource;
pub mod replay;
