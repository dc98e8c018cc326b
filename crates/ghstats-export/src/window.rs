//! Time-window engine.
//!
//! Assigns each event to a window keyed by its truncated timestamp, keeps a
//! small stash of open windows to absorb out-of-order input, and flushes
//! windows oldest first once the stash grows past its threshold.
//!
//! # Window lifecycle
//!
//! ```text
//! absent ──first event──▶ open ──stash overflow / final event──▶ flushed
//! ```
//!
//! A flushed window is never reopened. An event that maps to a flushed
//! window, or to any key at or below the newest flushed key, is a fatal
//! [`Error::LateEvent`]: the input order exceeded the stash tolerance and the
//! already written row cannot be amended.

use crate::aggregate::Aggregator;
use crate::row::Row;
use crate::{Error, Result};
use ghstats_core::{Event, Frequency, WindowKey};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Default number of flushed keys remembered for late-event detection.
pub const DEFAULT_FLUSHED_CAPACITY: usize = 2000;

/// Configuration for a window engine.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Bucketing frequency.
    pub frequency: Frequency,

    /// Open windows allowed before flushing. `None` uses the frequency default.
    pub stash_size: Option<usize>,

    /// Flushed keys remembered before the oldest half is pruned.
    pub flushed_capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::default(),
            stash_size: None,
            flushed_capacity: DEFAULT_FLUSHED_CAPACITY,
        }
    }
}

impl WindowConfig {
    pub fn with_frequency(frequency: Frequency) -> Self {
        Self {
            frequency,
            ..Default::default()
        }
    }

    /// Effective stash threshold (at least one window).
    pub fn threshold(&self) -> usize {
        self.stash_size
            .unwrap_or_else(|| self.frequency.default_stash_size())
            .max(1)
    }
}

/// A named unit that turns events into output rows.
///
/// This is the object-safe face of an exporter: the registry builds
/// `Box<dyn Exporter>` values and the pipeline drives them without knowing
/// their state types.
pub trait Exporter {
    /// Exporter name, also used in output file names and errors.
    fn name(&self) -> &str;

    /// Columns every output row is expected to carry, in order.
    fn columns(&self) -> Vec<String>;

    /// Consume one event. Returns the rows of any windows closed by it.
    ///
    /// `is_final` marks the last event of the stream and flushes everything.
    fn digest(&mut self, event: &Event, is_final: bool) -> Result<Vec<Row>>;
}

/// Counters kept by a window engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub events: usize,
    pub windows_opened: usize,
    pub windows_flushed: usize,
    pub rows_rendered: usize,
    pub flushed_keys_pruned: usize,
}

/// Bounded-lateness windowing over one [`Aggregator`].
pub struct WindowEngine<A: Aggregator> {
    name: String,
    aggregator: A,
    frequency: Frequency,
    threshold: usize,
    flushed_capacity: usize,
    open: BTreeMap<WindowKey, A::State>,
    flushed: BTreeSet<WindowKey>,
    watermark: Option<WindowKey>,
    stats: WindowStats,
}

impl<A: Aggregator> WindowEngine<A> {
    pub fn new(name: impl Into<String>, aggregator: A, config: &WindowConfig) -> Self {
        Self {
            name: name.into(),
            aggregator,
            frequency: config.frequency,
            threshold: config.threshold(),
            flushed_capacity: config.flushed_capacity.max(2),
            open: BTreeMap::new(),
            flushed: BTreeSet::new(),
            watermark: None,
            stats: WindowStats::default(),
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Keys of the open windows, ascending.
    pub fn open_keys(&self) -> Vec<WindowKey> {
        self.open.keys().copied().collect()
    }

    /// Remembered flushed keys, ascending.
    pub fn flushed_keys(&self) -> Vec<WindowKey> {
        self.flushed.iter().copied().collect()
    }

    /// Newest flushed key.
    pub fn watermark(&self) -> Option<WindowKey> {
        self.watermark
    }

    pub fn stats(&self) -> &WindowStats {
        &self.stats
    }

    fn is_closed(&self, key: WindowKey) -> bool {
        self.flushed.contains(&key) || self.watermark.is_some_and(|w| key <= w)
    }

    fn late_event(&self, key: WindowKey) -> Error {
        Error::LateEvent {
            exporter: self.name.clone(),
            key: key.to_string(),
            stash: self.open.keys().map(ToString::to_string).collect(),
        }
    }

    fn flush(&mut self, key: WindowKey, state: A::State, rows: &mut Vec<Row>) {
        let rendered = self.aggregator.render(key, &state);
        info!(
            "{}: flushed window {} ({} rows, {} open)",
            self.name,
            key,
            rendered.len(),
            self.open.len()
        );

        self.stats.windows_flushed += 1;
        self.stats.rows_rendered += rendered.len();
        rows.extend(rendered);

        self.flushed.insert(key);
        self.watermark = Some(key);

        if self.flushed.len() > self.flushed_capacity {
            let keep_from = self.flushed.iter().nth(self.flushed.len() / 2).copied();
            if let Some(pivot) = keep_from {
                let before = self.flushed.len();
                self.flushed = self.flushed.split_off(&pivot);
                self.stats.flushed_keys_pruned += before - self.flushed.len();
                debug!(
                    "{}: pruned {} flushed keys (oldest kept: {})",
                    self.name,
                    before - self.flushed.len(),
                    pivot
                );
            }
        }
    }
}

impl<A: Aggregator> Exporter for WindowEngine<A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Vec<String> {
        self.aggregator.columns()
    }

    fn digest(&mut self, event: &Event, is_final: bool) -> Result<Vec<Row>> {
        self.stats.events += 1;
        let key = self.frequency.window_key(&event.created_at)?;

        if self.is_closed(key) {
            return Err(self.late_event(key));
        }

        let state = match self.open.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("{}: opened window {}", self.name, key);
                self.stats.windows_opened += 1;
                entry.insert(self.aggregator.init_window(key))
            }
        };
        self.aggregator.fold(key, state, event);

        let mut rows = Vec::new();
        if is_final {
            while let Some((key, state)) = self.open.pop_first() {
                self.flush(key, state, &mut rows);
            }
        } else {
            while self.open.len() > self.threshold {
                let Some((key, state)) = self.open.pop_first() else {
                    break;
                };
                self.flush(key, state, &mut rows);
            }
        }

        Ok(rows)
    }
}
