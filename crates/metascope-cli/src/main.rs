//! metascope CLI - database schema snapshots

use metascope_cli::cli;
use metascope_cli::error::ConfigError;
use metascope_cli::logging;
use metascope_cli::metadata::SqlxMetadataSource;
use metascope_cli::output;

use anyhow::{Context, Result};
use clap::Parser;
use metascope_core::{CachingMetadata, SnapshotBuilder, SnapshotScope};
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Instant;

use cli::{Args, OutputFormat};
use output::{format_json, format_stats, format_table};

/// Connection, query, or output failure.
const EXIT_FAILURE: u8 = 1;
/// Configuration error (e.g. a URL for a backend without live support).
const EXIT_CONFIG_ERROR: u8 = 66;

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose, args.quiet);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("metascope: error: {e:#}");
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG_ERROR)
            } else {
                ExitCode::from(EXIT_FAILURE)
            }
        }
    }
}

fn run(args: Args) -> Result<()> {
    // Warn if credentials appear to be embedded in the URL
    if args.url.contains('@') && !args.url.starts_with("sqlite") && !args.quiet {
        eprintln!(
            "metascope: warning: Database credentials in the URL may be logged in shell history. \
             Consider setting DATABASE_URL or using a .pgpass file instead."
        );
    }

    let source = SqlxMetadataSource::connect(&args.url).context("Failed to connect to database")?;
    let metadata = CachingMetadata::new(&source, &source, source.dialect());

    let scope = SnapshotScope::new(args.catalog.as_deref(), args.schema.as_deref())
        .with_tables(args.tables.iter().map(String::as_str))
        .with_types(args.types.iter().map(String::as_str));

    let started = Instant::now();
    let snapshot = SnapshotBuilder::new(&metadata)
        .capture(&scope)
        .context("Failed to capture schema snapshot")?;
    tracing::info!(
        tables = snapshot.tables.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "snapshot captured"
    );

    let output_str = match args.format {
        OutputFormat::Json => {
            format_json(&snapshot, args.compact).context("Failed to serialize snapshot")?
        }
        OutputFormat::Table => format_table(&snapshot, !args.quiet),
    };

    write_output(&args.output, &output_str)?;

    if args.stats {
        eprint!("{}", format_stats(&metadata.fetch_report()));
        eprintln!();
    }

    Ok(())
}

fn write_output(path: &Option<std::path::PathBuf>, content: &str) -> Result<()> {
    if let Some(path) = path {
        fs::write(path, content)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    } else {
        io::stdout()
            .write_all(content.as_bytes())
            .context("Failed to write to stdout")?;
        // Ensure newline at end for terminal output
        if !content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
