//! Prepare exported statistics for bulk indexing.
//!
//! Reads a file written by `ghstats-export`, converts each record into a
//! search-index document and writes Elasticsearch `_bulk` request bodies.
//!
//! # Usage
//!
//! ```bash
//! # Write the bulk body to a file
//! ghstats-bulk -i output/delete_2024_1d.csv -o delete.bulk.ndjson
//!
//! # Pipe into curl
//! ghstats-bulk -i output/watch_2024_1h.csv.gz | \
//!     curl -s -H 'Content-Type: application/x-ndjson' --data-binary @- localhost:9200/_bulk
//!
//! # Print the index mapping for a record type
//! ghstats-bulk --mapping watch
//! ```

use anyhow::{Context, Result, bail};
use clap::Parser;
use ghstats_export::bulk::{self, BulkConfig, BulkFileTarget, BulkStats, BulkTarget};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Convert exported statistics to Elasticsearch bulk requests.
#[derive(Parser, Debug)]
#[command(name = "ghstats-bulk")]
#[command(about = "Convert exported GH Archive statistics to Elasticsearch bulk requests")]
struct Args {
    /// Exported CSV or NDJSON file (optionally gzipped)
    #[arg(short, long, required_unless_present = "mapping")]
    input: Option<PathBuf>,

    /// Bulk body output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Documents per batch
    #[arg(long, env = "GHSTATS_BULK_BATCH_SIZE", default_value = "500")]
    batch_size: usize,

    /// Print progress every N records
    #[arg(long, default_value = "100000")]
    progress_interval: usize,

    /// Print the index mapping of a record type and exit
    #[arg(long)]
    mapping: Option<String>,

    /// Path to .env file (optional)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load .env file if it exists, then re-read so env-backed options see it
    let args = if Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
        Args::parse()
    } else {
        args
    };

    // Logs go to stderr so stdout can carry the bulk body
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    if let Some(record_type) = &args.mapping {
        let index = bulk::bulk_index(record_type)?;
        println!("{}", serde_json::to_string_pretty(&index.mapping())?);
        return Ok(());
    }

    let Some(input) = args.input.as_ref() else {
        bail!("--input is required");
    };
    let config = BulkConfig {
        batch_size: args.batch_size,
        progress_interval: args.progress_interval,
    };

    let start = Instant::now();
    let stats = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            run(input, &config, &mut BulkFileTarget::new(BufWriter::new(file)))?
        }
        None => run(input, &config, &mut BulkFileTarget::new(io::stdout().lock()))?,
    };

    print_summary(&args, input, &stats, start.elapsed());
    Ok(())
}

fn run(input: &Path, config: &BulkConfig, target: &mut dyn BulkTarget) -> Result<BulkStats> {
    bulk::export_bulk(input, config, target)
        .with_context(|| format!("Bulk export of {} failed", input.display()))
}

fn print_summary(args: &Args, input: &Path, stats: &BulkStats, elapsed: std::time::Duration) {
    let mut err = io::stderr().lock();
    let _ = writeln!(err, "\n══════════════════════════════════════════════════════════════════");
    let _ = writeln!(err, "SUMMARY");
    let _ = writeln!(err, "══════════════════════════════════════════════════════════════════\n");
    let _ = writeln!(err, "Input:       {}", input.display());
    match &args.output {
        Some(path) => {
            let _ = writeln!(err, "Output:      {}", path.display());
        }
        None => {
            let _ = writeln!(err, "Output:      <stdout>");
        }
    }
    let _ = writeln!(err);
    let _ = writeln!(err, "Records:           {:>12}", stats.records);
    let _ = writeln!(err, "Documents:         {:>12}", stats.documents);
    let _ = writeln!(err, "Batches:           {:>12}", stats.batches);
    let _ = writeln!(err, "Elapsed time:      {:>12.2?}", elapsed);
}
