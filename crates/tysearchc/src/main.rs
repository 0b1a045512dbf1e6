//! The tysearch CLI.
//!
//! Provides the `tysearchc` command with the following subcommands:
//!
//! - `tysearchc build --output <file> <entries.json>` - Build an index from
//!   a JSON entries file
//! - `tysearchc search --index <file> [--exhaustive] [-n <int>] [<pkg>...] <type>`
//!   - Search an index for entries whose type unifies with the query
//! - `tysearchc stats --index <file>` - Print index statistics
//!
//! The entries file is a JSON array of `{"path": "...", "type": "..."}`
//! records, the handoff format of the library harvester. `RUST_LOG`
//! controls diagnostic logging.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use tysearch_index::{Index, Path as ItemPath, SearchOptions};
use tysearch_syntax::{parse_type, ParseError};

#[derive(Parser)]
#[command(name = "tysearchc", version, about = "Search library functions by type")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a JSON entries file
    Build {
        /// Path to the entries file (a JSON array of {"path", "type"} records)
        entries: PathBuf,

        /// Where to write the index
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Search an index for entries whose type unifies with a query
    Search {
        /// Path to the index file
        #[arg(long)]
        index: PathBuf,

        /// Unify against every entry instead of feature-filtered candidates
        #[arg(long)]
        exhaustive: bool,

        /// Keep at most N results
        #[arg(short = 'n', long = "limit")]
        limit: Option<usize>,

        /// Optional package names to restrict to, then the query type
        /// (e.g. `List "int list -> int"`)
        #[arg(required = true)]
        args: Vec<String>,
    },
    /// Print entry, cell, and term counts for an index
    Stats {
        /// Path to the index file
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build { entries, output } => build(&entries, &output),
        Commands::Search {
            index,
            exhaustive,
            limit,
            args,
        } => search(&index, exhaustive, limit, &args),
        Commands::Stats { index } => stats(&index),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

/// One record of the harvester's entries file.
#[derive(Deserialize)]
struct EntryRecord {
    path: String,
    #[serde(rename = "type")]
    ty: String,
}

/// Execute the build pipeline: read entries -> parse each type -> build the
/// index -> save.
fn build(entries: &std::path::Path, output: &std::path::Path) -> Result<(), String> {
    let text = std::fs::read_to_string(entries)
        .map_err(|e| format!("failed to read '{}': {}", entries.display(), e))?;
    let records: Vec<EntryRecord> = serde_json::from_str(&text)
        .map_err(|e| format!("failed to parse '{}': {}", entries.display(), e))?;

    let mut parsed = Vec::with_capacity(records.len());
    let mut skipped = 0usize;
    for record in records {
        let path = match ItemPath::parse(&record.path) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(path = %record.path, error = %e, "skipping entry with a bad path");
                skipped += 1;
                continue;
            }
        };
        match parse_type(&record.ty) {
            Ok(expr) => parsed.push((path, expr)),
            Err(e) => {
                tracing::warn!(path = %record.path, error = %e, "skipping entry with an unparseable type");
                skipped += 1;
            }
        }
    }

    let index = Index::build(parsed);
    index.save(output).map_err(|e| e.to_string())?;

    eprintln!(
        "  Indexed: {} entries, {} distinct types ({} skipped) -> {}",
        index.entry_count(),
        index.cell_count(),
        skipped,
        output.display()
    );
    Ok(())
}

/// Load the index, parse the query, search, print ranked results.
fn search(
    index_file: &std::path::Path,
    exhaustive: bool,
    limit: Option<usize>,
    args: &[String],
) -> Result<(), String> {
    let (packages, query_src) = args.split_at(args.len() - 1);
    let query_src = query_src[0].as_str();

    let mut index = Index::load(index_file).map_err(|e| e.to_string())?;

    let expr = match parse_type(query_src) {
        Ok(expr) => expr,
        Err(e) => {
            report_parse_error(query_src, &e);
            return Err(format!("invalid query type `{}`", query_src));
        }
    };
    let query = index.import_query(&expr);

    let opts = SearchOptions {
        exhaustive,
        limit,
        packages: packages.to_vec(),
    };
    let results = index.search(query, &opts).map_err(|e| e.to_string())?;

    for result in &results {
        println!("{} : {}", result.path, index.env().display(result.ty));
    }
    Ok(())
}

/// Print index statistics via the entry walk.
fn stats(index_file: &std::path::Path) -> Result<(), String> {
    let index = Index::load(index_file).map_err(|e| e.to_string())?;

    let mut entries = 0usize;
    index.iter(|_| entries += 1);
    println!("entries:  {}", entries);
    println!("cells:    {}", index.cell_count());
    println!("terms:    {}", index.term_count());
    println!(
        "packages: {}",
        index.packages().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

/// Render a query parse error as an ariadne report over the query string.
fn report_parse_error(source: &str, error: &ParseError) {
    use ariadne::{Label, Report, ReportKind, Source};
    let start = error.span.start as usize;
    let end = (error.span.end as usize).max(start + 1);
    let _ = Report::<std::ops::Range<usize>>::build(ReportKind::Error, start..end)
        .with_message("Parse error")
        .with_label(Label::new(start..end).with_message(&error.message))
        .finish()
        .eprint(Source::from(source));
}
