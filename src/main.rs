//! pcapql CLI entry point.

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pcapql::cli::{Args, Command, OutputFormat, OutputFormatter, StoreArgs};
use pcapql::index::PROTOCOL_BITS;
use pcapql::{IndexBuilder, QueryEngine};
use pcapql_core::protocol::{default_registry, Protocol, FRAME_FIELDS};

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();

    match args.command {
        Command::Index { store } => build_indexes(&store),
        Command::Query {
            store,
            query,
            query_file,
            format,
            prune_by_interval,
            stats,
        } => {
            let query = match (query, query_file) {
                (Some(query), _) => query,
                (None, Some(path)) => read_query(&path)?,
                (None, None) => bail!("Query text or --file required. Use --help for usage."),
            };
            run_query(&store, &query, format, prune_by_interval, stats)
        }
        Command::Fields => {
            list_fields();
            Ok(())
        }
    }
}

fn read_query(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read query file: {}", path.display()))
}

fn build_indexes(store: &StoreArgs) -> Result<()> {
    let config = store.config();
    let builder = IndexBuilder::new(&config).context("Failed to create index builder")?;
    let report = builder.build_all().with_context(|| {
        format!(
            "Failed to index segments in {}",
            config.segments_dir().display()
        )
    })?;

    eprintln!(
        "Indexed {} segments ({} packets) into {}",
        report.built.len(),
        report.total_packets(),
        config.index_dir().display()
    );
    for (segment, reason) in &report.failed {
        eprintln!("  segment {segment} failed: {reason}");
    }
    Ok(())
}

fn run_query(
    store: &StoreArgs,
    query: &str,
    format: OutputFormat,
    prune_by_interval: bool,
    stats: bool,
) -> Result<()> {
    let config = store.config().with_prune_by_interval(prune_by_interval);
    let engine = QueryEngine::new(config).context("Failed to create query engine")?;
    let result = engine.run(query)?;

    let formatter = OutputFormatter::new(format);
    formatter.write(&result, &mut io::stdout())?;

    if stats || result.has_errors() {
        OutputFormatter::write_summary(&result, &mut io::stderr())?;
    }
    Ok(())
}

fn list_fields() {
    let registry = default_registry();

    println!("frame:");
    println!("    {}", FRAME_FIELDS.join(", "));

    for parser in registry.all_parsers() {
        let aliases = parser.aliases();
        if aliases.is_empty() {
            println!("{}:", parser.name());
        } else {
            println!("{} ({}):", parser.name(), aliases.join(", "));
        }
        println!("    {}", parser.fields().join(", "));
    }

    println!();
    println!("Indexed protocols:");
    let names: Vec<&str> = PROTOCOL_BITS.iter().map(|(name, _)| *name).collect();
    println!("    {}", names.join(", "));
}
