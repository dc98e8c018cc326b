//! Pipeline driver.
//!
//! Pulls events one at a time and hands each to every (exporter, sink)
//! output, so a single pass over the archive feeds all exporters. The last
//! event of the stream is digested with `is_final = true`, which makes every
//! exporter flush its remaining windows.
//!
//! On error every sink is finished best-effort before the error is
//! returned, so partial output is left in a readable state.

use crate::Result;
use crate::sink::RowSink;
use crate::window::Exporter;
use ghstats_core::Event;
use std::path::PathBuf;
use tracing::{info, warn};

struct Output {
    exporter: Box<dyn Exporter>,
    sink: Box<dyn RowSink>,
}

/// Per-output results of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputStats {
    pub exporter: String,
    pub rows_written: usize,
    pub files: Vec<PathBuf>,
}

/// Results of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Events digested.
    pub events: usize,

    pub outputs: Vec<OutputStats>,
}

/// Fan-out from one event stream to several exporters.
#[derive(Default)]
pub struct Pipeline {
    outputs: Vec<Output>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exporter with the sink receiving its rows.
    pub fn add(&mut self, exporter: Box<dyn Exporter>, sink: Box<dyn RowSink>) {
        self.outputs.push(Output { exporter, sink });
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Consume the event stream and finish every sink.
    pub fn run<I>(&mut self, events: I) -> Result<PipelineStats>
    where
        I: IntoIterator<Item = Result<Event>>,
    {
        let digested = match self.drive(events) {
            Ok(count) => count,
            Err(e) => {
                self.finish_best_effort();
                return Err(e);
            }
        };

        for output in &mut self.outputs {
            output.sink.finish()?;
        }

        info!(
            "Pipeline finished: {} events through {} exporters",
            digested,
            self.outputs.len()
        );

        Ok(PipelineStats {
            events: digested,
            outputs: self
                .outputs
                .iter()
                .map(|o| OutputStats {
                    exporter: o.exporter.name().to_string(),
                    rows_written: o.sink.rows_written(),
                    files: o.sink.files().to_vec(),
                })
                .collect(),
        })
    }

    fn drive<I>(&mut self, events: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<Event>>,
    {
        let mut events = events.into_iter().peekable();
        let mut digested = 0;

        while let Some(next) = events.next() {
            let event = next?;
            let is_final = events.peek().is_none();

            for output in &mut self.outputs {
                for row in output.exporter.digest(&event, is_final)? {
                    output.sink.write_row(&row)?;
                }
            }
            digested += 1;
        }

        Ok(digested)
    }

    fn finish_best_effort(&mut self) {
        for output in &mut self.outputs {
            if let Err(e) = output.sink.finish() {
                warn!(
                    "Failed to finish output of {}: {}",
                    output.exporter.name(),
                    e
                );
            }
        }
    }
}
