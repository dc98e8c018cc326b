//! Bounded in-memory deduplication of event IDs.
//!
//! This module provides the [`DedupeIndex`] which tracks the event IDs the
//! archive source has already yielded. Hourly archive files overlap at their
//! edges, so the same event can appear twice within a few files.
//!
//! # Eviction
//!
//! Memory is bounded: once the index holds `capacity` IDs, the smallest half
//! is dropped. GH Archive IDs grow with time, so "smallest" approximates
//! "oldest". A repeat of an evicted ID is not detected; IDs inserted after
//! the latest eviction always are.
//!
//! IDs are ordered numerically (shorter decimal strings first, then
//! lexically) so that `"999"` sorts before `"1000"`.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

/// Default number of IDs retained before eviction.
pub const DEFAULT_DEDUPE_CAPACITY: usize = 1_000_000;

/// Event ID with numeric-aware ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EventId(String);

impl Ord for EventId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for EventId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded set of recently seen event IDs.
#[derive(Debug)]
pub struct DedupeIndex {
    ids: BTreeSet<EventId>,
    capacity: usize,
    evictions: usize,
    evicted_ids: usize,
}

impl Default for DedupeIndex {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUPE_CAPACITY)
    }
}

impl DedupeIndex {
    /// Create an index that retains at most `capacity` IDs (minimum 2).
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: BTreeSet::new(),
            capacity: capacity.max(2),
            evictions: 0,
            evicted_ids: 0,
        }
    }

    /// Check and mark an event ID in one operation.
    ///
    /// Returns `true` if the ID is new, `false` if it was already seen.
    pub fn check_and_mark(&mut self, event_id: &str) -> bool {
        if !self.ids.insert(EventId(event_id.to_string())) {
            return false;
        }

        if self.ids.len() >= self.capacity {
            self.evict_oldest_half();
        }

        true
    }

    /// Check if an event ID has not been seen (without marking it).
    pub fn is_new(&self, event_id: &str) -> bool {
        !self.ids.contains(&EventId(event_id.to_string()))
    }

    fn evict_oldest_half(&mut self) {
        let evict = self.capacity / 2;
        let Some(pivot) = self.ids.iter().nth(evict).cloned() else {
            return;
        };
        self.ids = self.ids.split_off(&pivot);
        self.evictions += 1;
        self.evicted_ids += evict;
        debug!(
            "Evicted {} event IDs from dedupe index (oldest kept: {})",
            evict, pivot.0
        );
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn stats(&self) -> DedupeStats {
        DedupeStats {
            retained_ids: self.ids.len(),
            capacity: self.capacity,
            evictions: self.evictions,
            evicted_ids: self.evicted_ids,
        }
    }
}

/// Statistics about the dedupe index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupeStats {
    /// IDs currently retained.
    pub retained_ids: usize,

    /// Retention limit.
    pub capacity: usize,

    /// Number of eviction passes.
    pub evictions: usize,

    /// Total IDs dropped by eviction.
    pub evicted_ids: usize,
}
