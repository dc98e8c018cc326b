//! Row sinks.
//!
//! A sink receives the rows of flushed windows and persists them:
//!
//! - [`CsvSink`]: header plus one line per row. When a row brings a column
//!   the current file lacks, the file is closed and writing continues in a
//!   rotated file (`<stem>-<n>.<ext>`) with the extended header.
//! - [`NdjsonSink`]: one JSON object per line.
//!
//! Paths ending in `.gz` are gzip-compressed. Files are created on the first
//! row, so an exporter that produces nothing leaves nothing behind.

mod csv;
mod ndjson;

pub use self::csv::{CsvSink, rotated_path};
pub use self::ndjson::NdjsonSink;

use crate::row::Row;
use crate::{Error, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Destination of rendered rows.
pub trait RowSink {
    fn write_row(&mut self, row: &Row) -> Result<()>;

    /// Flush and close the current file. Safe to call more than once.
    fn finish(&mut self) -> Result<()>;

    /// Files created so far, in creation order.
    fn files(&self) -> &[PathBuf];

    fn rows_written(&self) -> usize;
}

/// Serialization format of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Csv,
    Ndjson,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Ndjson => "ndjson",
        }
    }

    /// Infer the format from a file name, ignoring a trailing `.gz`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        match name.rsplit_once('.') {
            Some((_, ext)) => ext.parse(),
            None => Err(Error::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "ndjson" | "jsonl" => Ok(OutputFormat::Ndjson),
            _ => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Configuration for opening a sink.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Output file. A `.gz` suffix enables compression.
    pub path: PathBuf,

    /// Format; inferred from `path` when `None`.
    pub format: Option<OutputFormat>,

    /// Columns written first, in order (CSV only).
    pub fixed_columns: Vec<String>,
}

impl SinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            fixed_columns: Vec::new(),
        }
    }

    pub fn format(&self) -> Result<OutputFormat> {
        match self.format {
            Some(format) => Ok(format),
            None => OutputFormat::from_path(&self.path),
        }
    }
}

/// Open a sink for a configuration. Nothing is created on disk yet.
pub fn open_sink(config: SinkConfig) -> Result<Box<dyn RowSink>> {
    Ok(match config.format()? {
        OutputFormat::Csv => Box::new(CsvSink::new(config.path, config.fixed_columns)),
        OutputFormat::Ndjson => Box::new(NdjsonSink::new(config.path)),
    })
}

/// Whether a path names a gzip file.
pub fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Output file, plain or gzip-compressed.
pub(crate) enum OutputFile {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputFile {
    pub(crate) fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::with_capacity(1024 * 1024, File::create(path)?);
        Ok(if is_gzip(path) {
            OutputFile::Gzip(GzEncoder::new(writer, Compression::default()))
        } else {
            OutputFile::Plain(writer)
        })
    }

    /// Flush buffers and write the gzip trailer.
    pub(crate) fn finish(self) -> io::Result<()> {
        match self {
            OutputFile::Plain(mut writer) => writer.flush(),
            OutputFile::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputFile::Plain(w) => w.write(buf),
            OutputFile::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputFile::Plain(w) => w.flush(),
            OutputFile::Gzip(w) => w.flush(),
        }
    }
}

fn already_finished(path: &Path) -> Error {
    Error::Io(io::Error::other(format!(
        "sink for {} is already finished",
        path.display()
    )))
}
