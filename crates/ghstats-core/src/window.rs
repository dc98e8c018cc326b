//! Window frequencies and keys.
//!
//! A [`WindowKey`] is an event timestamp truncated to a [`Frequency`]
//! boundary. Keys order chronologically, and their ISO-8601 rendering is
//! fixed-width, so string order matches key order.

use crate::ISO_SECONDS;
use crate::error::{Error, Result};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::fmt;
use std::str::FromStr;

/// Bucketing granularity of a window engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Frequency {
    #[default]
    Day,
    Hour,
    TenMinutes,
    Minute,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Day => "1d",
            Frequency::Hour => "1h",
            Frequency::TenMinutes => "10min",
            Frequency::Minute => "1min",
        }
    }

    pub fn all() -> [Frequency; 4] {
        [
            Frequency::Day,
            Frequency::Hour,
            Frequency::TenMinutes,
            Frequency::Minute,
        ]
    }

    pub fn duration(&self) -> TimeDelta {
        match self {
            Frequency::Day => TimeDelta::days(1),
            Frequency::Hour => TimeDelta::hours(1),
            Frequency::TenMinutes => TimeDelta::minutes(10),
            Frequency::Minute => TimeDelta::minutes(1),
        }
    }

    /// Number of windows allowed open before the oldest are flushed.
    ///
    /// Hourly files rarely overlap by more than one bucket at coarse
    /// frequencies; minute buckets see a couple of hours of jitter.
    pub fn default_stash_size(&self) -> usize {
        match self {
            Frequency::Day | Frequency::Hour => 2,
            Frequency::TenMinutes => 12,
            Frequency::Minute => 120,
        }
    }

    /// Window key for an event timestamp.
    pub fn window_key(&self, timestamp: &DateTime<Utc>) -> Result<WindowKey> {
        timestamp
            .duration_trunc(self.duration())
            .map(WindowKey)
            .map_err(|e| Error::Truncate {
                timestamp: timestamp.to_rfc3339(),
                frequency: self.as_str(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1d" | "d" | "day" => Ok(Frequency::Day),
            "1h" | "h" | "hour" => Ok(Frequency::Hour),
            "10min" | "10-minute" => Ok(Frequency::TenMinutes),
            "1min" | "min" | "minute" => Ok(Frequency::Minute),
            _ => Err(Error::UnsupportedFrequency(s.to_string())),
        }
    }
}

/// Start of a window, truncated to its frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowKey(DateTime<Utc>);

impl WindowKey {
    pub fn start(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(ISO_SECONDS))
    }
}
