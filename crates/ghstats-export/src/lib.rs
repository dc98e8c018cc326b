//! GH Archive export pipeline.
//!
//! This crate turns the hourly GH Archive dumps into time-bucketed
//! statistics written as CSV or NDJSON.
//!
//! # Modules
//!
//! - [`source`] - Archive reader (file selection, gzip decoding, dedupe)
//! - [`window`] - Window engine and the [`Exporter`] trait
//! - [`aggregate`] - Aggregation strategies (type/user counters, detail extractors)
//! - [`registry`] - Static table of named exporters
//! - [`sink`] - CSV and NDJSON row sinks
//! - [`pipeline`] - Fan-out driver from one event stream to many exporters
//! - [`bulk`] - Search-index document preparation from exported files
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  ArchiveSource  │  <raw>/<year>/*.json.gz, chronological, deduplicated
//! └────────┬────────┘
//!          │ one event at a time
//!          ▼
//! ┌─────────────────┐
//! │    Pipeline     │  fan-out, marks the last event as final
//! └──┬──────────┬───┘
//!    ▼          ▼
//! ┌───────┐  ┌───────┐
//! │Window │  │Window │  WindowEngine<Aggregator>: stash of open windows,
//! │Engine │  │Engine │  flushed oldest first
//! └──┬────┘  └──┬────┘
//!    ▼          ▼
//! ┌───────┐  ┌───────┐
//! │CsvSink│  │Ndjson │  rows of flushed windows
//! └───────┘  └───────┘
//! ```

pub mod aggregate;
pub mod bulk;
pub mod dedupe;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod row;
pub mod sink;
pub mod source;
pub mod window;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

pub use aggregate::Aggregator;
pub use dedupe::{DedupeIndex, DedupeStats};
pub use pipeline::{OutputStats, Pipeline, PipelineStats};
pub use registry::{EXPORTERS, ExporterEntry};
pub use row::Row;
pub use sink::{OutputFormat, RowSink, SinkConfig, open_sink};
pub use source::{ArchiveConfig, ArchiveSelector, ArchiveSource, SourceStats};
pub use window::{Exporter, WindowConfig, WindowEngine, WindowStats};
