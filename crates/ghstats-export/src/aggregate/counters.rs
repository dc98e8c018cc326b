//! Counting aggregators.

use super::Aggregator;
use crate::row::Row;
use ghstats_core::{Event, WindowKey};
use std::collections::BTreeMap;

/// Type tags that get a column in every type-count file, even when a window
/// has none of them. Other tags are appended as they appear.
pub const KNOWN_TYPE_TAGS: &[&str] = &[
    "CommitCommentEvent-created",
    "CreateEvent",
    "DeleteEvent",
    "ForkEvent",
    "GollumEvent",
    "IssueCommentEvent-created",
    "IssuesEvent-closed",
    "IssuesEvent-opened",
    "IssuesEvent-reopened",
    "MemberEvent-added",
    "PublicEvent",
    "PullRequestEvent-closed",
    "PullRequestEvent-opened",
    "PullRequestEvent-reopened",
    "PullRequestReviewCommentEvent-created",
    "PullRequestReviewEvent-created",
    "ReleaseEvent-published",
    "WatchEvent-started",
];

/// Largest push size that gets a fixed `PushEvent-N` column.
const MAX_FIXED_PUSH_SIZE: u64 = 20;

/// Counters of one window: a total plus one count per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCounts {
    pub all: u64,
    pub counts: BTreeMap<String, u64>,
}

impl TypeCounts {
    fn add(&mut self, key: String) {
        *self.counts.entry(key).or_default() += 1;
        self.all += 1;
    }

    fn to_row(&self, key: WindowKey) -> Row {
        let mut row = Row::new().with("date", key.to_string()).with("all", self.all);
        for (tag, count) in &self.counts {
            row.set(tag.as_str(), *count);
        }
        row
    }
}

/// Events per normalized type tag (`PushEvent-3`, `IssuesEvent-opened`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeCounter;

impl Aggregator for TypeCounter {
    type State = TypeCounts;

    fn columns(&self) -> Vec<String> {
        let mut columns = vec!["date".to_string(), "all".to_string()];
        columns.extend(KNOWN_TYPE_TAGS.iter().map(|t| t.to_string()));
        columns.extend((0..=MAX_FIXED_PUSH_SIZE).map(|n| format!("PushEvent-{n}")));
        columns
    }

    fn init_window(&self, _key: WindowKey) -> TypeCounts {
        TypeCounts::default()
    }

    fn fold(&self, _key: WindowKey, state: &mut TypeCounts, event: &Event) {
        state.add(event.normalized_type());
    }

    fn render(&self, key: WindowKey, state: &TypeCounts) -> Vec<Row> {
        vec![state.to_row(key)]
    }
}

/// Events per `<type>/<login>/<repo>` key.
///
/// The key space is open-ended, so no columns are declared; this exporter
/// is normally written as NDJSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserCounter;

impl Aggregator for UserCounter {
    type State = TypeCounts;

    fn init_window(&self, _key: WindowKey) -> TypeCounts {
        TypeCounts::default()
    }

    fn fold(&self, _key: WindowKey, state: &mut TypeCounts, event: &Event) {
        state.add(format!(
            "{}/{}/{}",
            event.normalized_type(),
            event.actor_login(),
            event.repo.name
        ));
    }

    fn render(&self, key: WindowKey, state: &TypeCounts) -> Vec<Row> {
        vec![state.to_row(key)]
    }
}
