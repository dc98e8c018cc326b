//! Error types for the export pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during export.
#[derive(Error, Debug)]
pub enum Error {
    /// Event model error (frequency parsing, key truncation).
    #[error(transparent)]
    Core(#[from] ghstats_core::Error),

    /// An event mapped to a window that is already closed.
    ///
    /// The input order exceeded the lateness tolerance of the stash. Retrying
    /// cannot help: order is fixed by file enumeration.
    #[error("{exporter}: late event for closed window {key}; current stash: [{}]", .stash.join(", "))]
    LateEvent {
        /// Exporter whose window engine rejected the event.
        exporter: String,
        /// The offending window key.
        key: String,
        /// Keys open at the time of the violation, ascending.
        stash: Vec<String>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Output format not recognised.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// No exporter registered under this name.
    #[error("unknown exporter '{0}'")]
    UnknownExporter(String),

    /// Invalid year/month/day selector.
    #[error("invalid archive selector: {0}")]
    InvalidSelector(String),

    /// Bulk-index preparation error.
    #[error("bulk error: {0}")]
    Bulk(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_late_event_display_lists_stash() {
        let err = Error::LateEvent {
            exporter: "type".to_string(),
            key: "2024-01-01T00:00:00Z".to_string(),
            stash: vec![
                "2024-01-02T00:00:00Z".to_string(),
                "2024-01-03T00:00:00Z".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("type: late event for closed window 2024-01-01T00:00:00Z"));
        assert!(msg.contains("[2024-01-02T00:00:00Z, 2024-01-03T00:00:00Z]"));
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: Error = ghstats_core::Error::UnsupportedFrequency("2h".to_string()).into();
        assert!(matches!(err, Error::Core(_)));
        assert!(err.to_string().starts_with("unsupported frequency '2h'"));
    }

    #[test]
    fn test_from_io_error() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
