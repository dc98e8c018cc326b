//! Event sources.
//!
//! The only source is the GH Archive reader, [`ArchiveSource`]: it walks the
//! hourly files selected by an [`ArchiveSelector`], decompresses them, parses
//! one event per line and drops duplicate event IDs. It is a plain
//! [`Iterator`], so the pipeline pulls one event at a time.

mod archive;

pub use archive::{ArchiveConfig, ArchiveSelector, ArchiveSource, chronological_sort_key};

/// Statistics from reading an event source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Files selected for reading.
    pub files_total: usize,

    /// Files read to the end.
    pub files_processed: usize,

    /// Bytes read from disk (compressed size).
    pub bytes_read: u64,

    /// Lines read, including blank and malformed ones.
    pub total_lines: usize,

    /// Lines that decoded into an event.
    pub total_events: usize,

    /// Events yielded downstream.
    pub unique_events: usize,

    /// Events dropped because their ID was already seen.
    pub duplicate_events: usize,

    /// Lines that failed to decode.
    pub parse_errors: usize,
}
