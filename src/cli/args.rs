//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::EngineConfig;

/// Query indexed packet-capture segments with PQL.
#[derive(Parser, Debug)]
#[command(name = "pcapql")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the per-segment indexes and the master index
    Index {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Run a PQL query
    Query {
        #[command(flatten)]
        store: StoreArgs,

        /// Query text
        #[arg(value_name = "PQL", conflicts_with = "query_file")]
        query: Option<String>,

        /// Read the query from a file
        #[arg(short = 'f', long = "file", value_name = "QUERY_FILE")]
        query_file: Option<PathBuf>,

        /// Output format for stdout
        #[arg(long = "format", value_enum, default_value = "table")]
        format: OutputFormat,

        /// Skip segments outside the INTERVAL of the query
        #[arg(long = "prune-by-interval")]
        prune_by_interval: bool,

        /// Print match counts and the time range to stderr
        #[arg(long = "stats")]
        stats: bool,
    },

    /// List the fields queries can reference
    Fields,
}

/// Where segments and indexes live, shared by `index` and `query`.
#[derive(clap::Args, Debug, Clone)]
pub struct StoreArgs {
    /// Directory of `<id>.pcap` segment files
    #[arg(long = "segments", env = "PCAPQL_SEGMENTS", default_value = "segments")]
    pub segments: PathBuf,

    /// Directory of the SQLite index files
    #[arg(long = "index", env = "PCAPQL_INDEX", default_value = "index")]
    pub index: PathBuf,

    /// Worker threads (defaults to available parallelism)
    #[arg(short = 'j', long = "workers", env = "PCAPQL_WORKERS")]
    pub workers: Option<usize>,
}

impl StoreArgs {
    pub fn config(&self) -> EngineConfig {
        let config = EngineConfig::new(&self.segments, &self.index);
        match self.workers {
            Some(workers) => config.with_workers(workers),
            None => config,
        }
    }
}
