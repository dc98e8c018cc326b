//! Export windowed statistics from GH Archive files.
//!
//! Reads the hourly archive files for a year (optionally narrowed to a month
//! or day), runs every requested exporter over one pass of the events, and
//! writes one output file per exporter.
//!
//! # Pipeline
//!
//! ```text
//! [raw/<year>/*.json.gz] → [Dedupe] → [WindowEngine × N] → [CSV / NDJSON]
//! ```
//!
//! # Usage
//!
//! ```bash
//! # Daily type counts for 2024
//! ghstats-export --raw ./raw --year 2024 type
//!
//! # Hourly push and watch details for one day, gzipped
//! ghstats-export --year 2024 --month 3 --day 1 --freq 1h --gzip push watch
//!
//! # List exporters
//! ghstats-export --list
//! ```

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Utc};
use clap::Parser;
use ghstats_core::Frequency;
use ghstats_core::memory::{format_bytes, process_memory};
use ghstats_export::registry::{self, EXPORTERS};
use ghstats_export::{
    ArchiveConfig, ArchiveSelector, ArchiveSource, DedupeStats, OutputFormat, Pipeline,
    PipelineStats, SinkConfig, SourceStats, WindowConfig, open_sink,
};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Aggregate GH Archive events into time-bucketed statistics.
#[derive(Parser, Debug)]
#[command(name = "ghstats-export")]
#[command(about = "Aggregate GH Archive events into time-bucketed CSV/NDJSON statistics")]
struct Args {
    /// Exporters to run (see --list)
    #[arg(required_unless_present = "list")]
    exporters: Vec<String>,

    /// Path to raw archive data (one directory per year)
    #[arg(long, env = "GHSTATS_RAW_PATH", default_value = "raw")]
    raw: PathBuf,

    /// Year to process, or `*` for every year (default: current year)
    #[arg(long, env = "GHSTATS_YEAR")]
    year: Option<String>,

    /// Month to process (1-12)
    #[arg(long)]
    month: Option<u32>,

    /// Day to process (1-31, requires --month)
    #[arg(long)]
    day: Option<u32>,

    /// Window frequency: 1d, 1h, 10min or 1min
    #[arg(long, default_value = "1d")]
    freq: String,

    /// Open windows kept before flushing (default depends on --freq)
    #[arg(long)]
    stash_size: Option<usize>,

    /// Flushed window keys remembered for late-event detection
    #[arg(long, default_value = "2000")]
    flushed_capacity: usize,

    /// Output directory
    #[arg(short, long, env = "GHSTATS_OUTPUT", default_value = "output")]
    output: PathBuf,

    /// Output format for every exporter: csv or ndjson (default: per exporter)
    #[arg(long)]
    format: Option<String>,

    /// Gzip output files
    #[arg(long, default_value = "false")]
    gzip: bool,

    /// Event IDs retained for deduplication
    #[arg(long, default_value = "1000000")]
    dedupe_capacity: usize,

    /// Limit number of files to process (for testing)
    #[arg(long)]
    limit: Option<usize>,

    /// Print progress every N events
    #[arg(long, default_value = "100000")]
    progress_interval: usize,

    /// List available exporters and exit
    #[arg(long, default_value = "false")]
    list: bool,

    /// Path to .env file (optional)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

/// One configured exporter run.
struct Plan {
    entry: &'static registry::ExporterEntry,
    path: PathBuf,
    format: OutputFormat,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load .env file if it exists, then re-read so env-backed options see it
    let args = if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
        Args::parse()
    } else {
        args
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if args.list {
        print_exporters();
        return Ok(());
    }

    // Validate everything before touching the archive
    let frequency: Frequency = args.freq.parse()?;
    let year = match &args.year {
        Some(year) => year.clone(),
        None => Utc::now().year().to_string(),
    };
    let selector = ArchiveSelector::parse(&year, args.month, args.day)?;
    let window_config = WindowConfig {
        frequency,
        stash_size: args.stash_size,
        flushed_capacity: args.flushed_capacity,
    };
    let plans = plan_outputs(&args, &selector, frequency)?;

    let source = ArchiveSource::open(ArchiveConfig {
        raw_path: args.raw.clone(),
        selector,
        dedupe_capacity: args.dedupe_capacity,
        progress_interval: args.progress_interval,
        limit: args.limit,
    })
    .with_context(|| format!("Failed to open archive at {}", args.raw.display()))?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory {}", args.output.display()))?;

    let start = Instant::now();
    let (source_stats, dedupe_stats, pipeline_stats) = process(source, &plans, &window_config)?;
    let elapsed = start.elapsed();

    print_summary(&args, &selector, frequency, &source_stats, &dedupe_stats, &pipeline_stats, elapsed);

    Ok(())
}

/// Resolve exporter names, formats and output paths.
fn plan_outputs(
    args: &Args,
    selector: &ArchiveSelector,
    frequency: Frequency,
) -> Result<Vec<Plan>> {
    let forced_format = args
        .format
        .as_deref()
        .map(str::parse::<OutputFormat>)
        .transpose()?;

    let mut seen = HashSet::new();
    let mut plans = Vec::with_capacity(args.exporters.len());
    for name in &args.exporters {
        if !seen.insert(name.as_str()) {
            bail!("exporter '{}' given more than once", name);
        }
        let entry = registry::lookup(name)?;
        let format = forced_format.unwrap_or(entry.default_format);
        let mut file_name = format!(
            "{}_{}_{}.{}",
            entry.name,
            selector.label(),
            frequency,
            format.extension()
        );
        if args.gzip {
            file_name.push_str(".gz");
        }
        plans.push(Plan {
            entry,
            path: args.output.join(file_name),
            format,
        });
    }
    Ok(plans)
}

fn process(
    mut source: ArchiveSource,
    plans: &[Plan],
    window_config: &WindowConfig,
) -> Result<(SourceStats, DedupeStats, PipelineStats)> {
    let mut pipeline = Pipeline::new();
    for plan in plans {
        let exporter = plan.entry.build(window_config);
        let sink = open_sink(SinkConfig {
            path: plan.path.clone(),
            format: Some(plan.format),
            fixed_columns: exporter.columns(),
        })?;
        info!("{} → {}", plan.entry.name, plan.path.display());
        pipeline.add(exporter, sink);
    }

    let stats = pipeline
        .run(&mut source)
        .context("Export failed; outputs written so far are kept")?;

    Ok((source.stats().clone(), source.dedupe_stats(), stats))
}

fn print_exporters() {
    println!("Available exporters:\n");
    for entry in EXPORTERS {
        println!(
            "  {:<8} [{:<6}]  {}",
            entry.name,
            entry.default_format.extension(),
            entry.description
        );
    }
}

fn print_summary(
    args: &Args,
    selector: &ArchiveSelector,
    frequency: Frequency,
    source: &SourceStats,
    dedupe: &DedupeStats,
    pipeline: &PipelineStats,
    elapsed: Duration,
) {
    println!("\n══════════════════════════════════════════════════════════════════");
    println!("SUMMARY");
    println!("══════════════════════════════════════════════════════════════════\n");

    println!("Input:       {}", args.raw.display());
    println!("Selection:   {} @ {}", selector.label(), frequency);
    println!("Output:      {}", args.output.display());
    println!();
    println!("Files processed:   {:>12} / {}", source.files_processed, source.files_total);
    println!("Bytes read:        {:>12}", format_bytes(source.bytes_read));
    println!("Total lines:       {:>12}", source.total_lines);
    println!("Total events:      {:>12}", source.total_events);
    println!("Unique events:     {:>12}", source.unique_events);
    println!("Duplicate events:  {:>12}", source.duplicate_events);
    println!("Malformed lines:   {:>12}", source.parse_errors);
    println!();
    println!("Dedupe retained:   {:>12}", dedupe.retained_ids);
    println!("Dedupe evictions:  {:>12}", dedupe.evictions);
    println!();

    for output in &pipeline.outputs {
        println!("{:<8} {:>10} rows", output.exporter, output.rows_written);
        for file in &output.files {
            println!("    {}", file.display());
        }
    }

    println!();
    println!("Elapsed time:      {:>12.2?}", elapsed);
    if elapsed.as_secs_f64() > 0.0 {
        let events_per_sec = pipeline.events as f64 / elapsed.as_secs_f64();
        println!("Throughput:        {:>12.0} events/sec", events_per_sec);
    }
    println!("Memory:            {:>12}", format_bytes(process_memory()));
}
