//! Error types for the ghstats core types.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding events or computing window keys.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested window frequency is not one of the supported values.
    #[error("unsupported frequency '{0}' (expected one of 1d, 1h, 10min, 1min)")]
    UnsupportedFrequency(String),

    /// A timestamp could not be truncated to its window boundary.
    #[error("cannot truncate timestamp {timestamp} to {frequency}: {reason}")]
    Truncate {
        /// The event timestamp as received.
        timestamp: String,
        /// The frequency that was applied.
        frequency: &'static str,
        /// Description of what went wrong.
        reason: String,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
