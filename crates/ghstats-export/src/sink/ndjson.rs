//! Line-delimited JSON sink.

use super::{OutputFile, RowSink, already_finished};
use crate::Result;
use crate::row::Row;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

/// One JSON object per line, fields in row order.
pub struct NdjsonSink {
    path: PathBuf,
    writer: Option<OutputFile>,
    files: Vec<PathBuf>,
    rows_written: usize,
    finished: bool,
}

impl NdjsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            files: Vec::new(),
            rows_written: 0,
            finished: false,
        }
    }

    fn close_file(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        Ok(())
    }
}

impl RowSink for NdjsonSink {
    fn write_row(&mut self, row: &Row) -> Result<()> {
        if self.finished {
            return Err(already_finished(&self.path));
        }

        if self.writer.is_none() {
            debug!("Creating NDJSON file: {}", self.path.display());
            self.writer = Some(OutputFile::create(&self.path)?);
            self.files.push(self.path.clone());
        }

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, row)?;
            writer.write_all(b"\n")?;
        }
        self.rows_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        self.close_file()
    }

    fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn rows_written(&self) -> usize {
        self.rows_written
    }
}

impl Drop for NdjsonSink {
    fn drop(&mut self) {
        if let Err(e) = self.close_file() {
            warn!("Error closing {} on drop: {}", self.path.display(), e);
        }
    }
}
