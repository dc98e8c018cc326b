//! Detail extractors.
//!
//! Each detail looks at one event type, derives a composite key from the
//! event (actor, org, repo and a few payload fields) and accumulates a small
//! record per key. A window renders one row per key, sorted by key.

use super::Aggregator;
use crate::row::Row;
use ghstats_core::{Event, WindowKey};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Composite key of a detail row: one optional string per key column.
pub type DetailKey = Vec<Option<String>>;

/// Describes one detail extractor.
pub trait Detail {
    /// Accumulated values for one key.
    type Record: Default;

    /// Event type this detail applies to; other events are ignored.
    fn event_type(&self) -> &'static str;

    fn key_columns(&self) -> &'static [&'static str];

    fn record_columns(&self) -> &'static [&'static str];

    /// Key values, aligned with [`Detail::key_columns`].
    fn key(&self, event: &Event) -> DetailKey;

    fn update(&self, record: &mut Self::Record, event: &Event);

    /// Write the record columns into a row.
    fn render_record(&self, record: &Self::Record, row: &mut Row);
}

/// Windowed aggregation over a [`Detail`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailAggregator<D>(pub D);

impl<D: Detail> Aggregator for DetailAggregator<D> {
    type State = BTreeMap<DetailKey, D::Record>;

    fn columns(&self) -> Vec<String> {
        std::iter::once("date")
            .chain(self.0.key_columns().iter().copied())
            .chain(self.0.record_columns().iter().copied())
            .map(String::from)
            .collect()
    }

    fn init_window(&self, _key: WindowKey) -> Self::State {
        BTreeMap::new()
    }

    fn fold(&self, _key: WindowKey, state: &mut Self::State, event: &Event) {
        if event.kind != self.0.event_type() {
            return;
        }
        let record = state.entry(self.0.key(event)).or_default();
        self.0.update(record, event);
    }

    fn render(&self, key: WindowKey, state: &Self::State) -> Vec<Row> {
        let date = key.to_string();
        state
            .iter()
            .map(|(detail_key, record)| {
                let mut row = Row::new().with("date", date.as_str());
                for (column, value) in self.0.key_columns().iter().zip(detail_key) {
                    let value = value.as_deref().map_or(Value::Null, Value::from);
                    row.set(*column, value);
                }
                self.0.render_record(record, &mut row);
                row
            })
            .collect()
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// Record that only counts matching events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCount(pub u64);

/// Per-key push statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushRecord {
    pub events: u64,
    pub commits: u64,
    pub distinct_commits: u64,
    pub message_length: u64,
    pub authors: BTreeSet<String>,
}

/// Pushes per (user, org, repo, ref).
#[derive(Debug, Clone, Copy, Default)]
pub struct PushDetail;

impl Detail for PushDetail {
    type Record = PushRecord;

    fn event_type(&self) -> &'static str {
        "PushEvent"
    }

    fn key_columns(&self) -> &'static [&'static str] {
        &["user", "org", "repo", "ref"]
    }

    fn record_columns(&self) -> &'static [&'static str] {
        &["events", "commits", "distinct_commits", "message_length", "authors"]
    }

    fn key(&self, event: &Event) -> DetailKey {
        vec![
            Some(event.actor_login().to_string()),
            owned(event.org_login()),
            Some(event.repo.name.clone()),
            owned(event.payload_str("ref")),
        ]
    }

    fn update(&self, record: &mut PushRecord, event: &Event) {
        let commits = event.payload_commits();
        record.events += 1;
        record.commits += event.push_size();
        record.distinct_commits += event.payload_u64("distinct_size").unwrap_or_else(|| {
            commits
                .iter()
                .filter(|c| c.get("distinct").and_then(Value::as_bool).unwrap_or(true))
                .count() as u64
        });

        for commit in commits {
            if let Some(message) = commit.get("message").and_then(Value::as_str) {
                record.message_length += message.chars().count() as u64;
            }
            let author = commit.get("author");
            let identity = author
                .and_then(|a| a.get("email"))
                .and_then(Value::as_str)
                .or_else(|| author.and_then(|a| a.get("name")).and_then(Value::as_str));
            if let Some(identity) = identity {
                record.authors.insert(identity.to_string());
            }
        }
    }

    fn render_record(&self, record: &PushRecord, row: &mut Row) {
        row.set("events", record.events);
        row.set("commits", record.commits);
        row.set("distinct_commits", record.distinct_commits);
        row.set("message_length", record.message_length);
        row.set("authors", record.authors.len());
    }
}

/// Branch/tag creations per (user, org, repo, ref, ref_type, master_branch).
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateDetail;

impl Detail for CreateDetail {
    type Record = EventCount;

    fn event_type(&self) -> &'static str {
        "CreateEvent"
    }

    fn key_columns(&self) -> &'static [&'static str] {
        &["user", "org", "repo", "ref", "ref_type", "master_branch"]
    }

    fn record_columns(&self) -> &'static [&'static str] {
        &["events"]
    }

    fn key(&self, event: &Event) -> DetailKey {
        vec![
            Some(event.actor_login().to_string()),
            owned(event.org_login()),
            Some(event.repo.name.clone()),
            owned(event.payload_str("ref")),
            owned(event.payload_str("ref_type")),
            owned(event.payload_str("master_branch")),
        ]
    }

    fn update(&self, record: &mut EventCount, _event: &Event) {
        record.0 += 1;
    }

    fn render_record(&self, record: &EventCount, row: &mut Row) {
        row.set("events", record.0);
    }
}

/// Branch/tag deletions per (user, org, repo, ref, ref_type, pusher_type).
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteDetail;

impl Detail for DeleteDetail {
    type Record = EventCount;

    fn event_type(&self) -> &'static str {
        "DeleteEvent"
    }

    fn key_columns(&self) -> &'static [&'static str] {
        &["user", "org", "repo", "ref", "ref_type", "pusher_type"]
    }

    fn record_columns(&self) -> &'static [&'static str] {
        &["events"]
    }

    fn key(&self, event: &Event) -> DetailKey {
        vec![
            Some(event.actor_login().to_string()),
            owned(event.org_login()),
            Some(event.repo.name.clone()),
            owned(event.payload_str("ref")),
            owned(event.payload_str("ref_type")),
            owned(event.payload_str("pusher_type")),
        ]
    }

    fn update(&self, record: &mut EventCount, _event: &Event) {
        record.0 += 1;
    }

    fn render_record(&self, record: &EventCount, row: &mut Row) {
        row.set("events", record.0);
    }
}

/// Stars per (user, repo, action).
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchDetail;

impl Detail for WatchDetail {
    type Record = EventCount;

    fn event_type(&self) -> &'static str {
        "WatchEvent"
    }

    fn key_columns(&self) -> &'static [&'static str] {
        &["user", "repo", "action"]
    }

    fn record_columns(&self) -> &'static [&'static str] {
        &["events"]
    }

    fn key(&self, event: &Event) -> DetailKey {
        vec![
            Some(event.actor_login().to_string()),
            Some(event.repo.name.clone()),
            owned(event.payload_str("action")),
        ]
    }

    fn update(&self, record: &mut EventCount, _event: &Event) {
        record.0 += 1;
    }

    fn render_record(&self, record: &EventCount, row: &mut Row) {
        row.set("events", record.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghstats_core::Frequency;
    use serde_json::json;

    fn key() -> WindowKey {
        Frequency::Hour
            .window_key(&"2024-02-03T04:05:06Z".parse().unwrap())
            .unwrap()
    }

    fn event(json: &str) -> Event {
        Event::from_json(json).unwrap()
    }

    fn fold<D: Detail>(aggregator: &DetailAggregator<D>, events: &[Event]) -> Vec<Row> {
        let mut state = aggregator.init_window(key());
        for e in events {
            aggregator.fold(key(), &mut state, e);
        }
        aggregator.render(key(), &state)
    }

    fn push(id: u32, login: &str, commits: &str) -> Event {
        event(&format!(
            r#"{{"id":"{id}","type":"PushEvent","created_at":"2024-02-03T04:05:06Z",
                "actor":{{"login":"{login}"}},"repo":{{"name":"acme/app"}},"org":{{"login":"acme"}},
                "payload":{{"ref":"refs/heads/main","commits":{commits}}}}}"#
        ))
    }

    #[test]
    fn test_push_detail_accumulates_per_key() {
        let events = [
            push(
                1,
                "alice",
                r#"[{"message":"fix","distinct":true,"author":{"email":"a@x","name":"A"}},
                    {"message":"docs","distinct":false,"author":{"email":"b@x","name":"B"}}]"#,
            ),
            push(
                2,
                "alice",
                r#"[{"message":"héllo","distinct":true,"author":{"email":"a@x","name":"A"}}]"#,
            ),
        ];
        let rows = fold(&DetailAggregator(PushDetail), &events);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        let columns: Vec<_> = row.columns().collect();
        assert_eq!(
            columns,
            [
                "date",
                "user",
                "org",
                "repo",
                "ref",
                "events",
                "commits",
                "distinct_commits",
                "message_length",
                "authors"
            ]
        );
        assert_eq!(row.get("date"), Some(&json!("2024-02-03T04:00:00Z")));
        assert_eq!(row.get("org"), Some(&json!("acme")));
        assert_eq!(row.get("events"), Some(&json!(2)));
        assert_eq!(row.get("commits"), Some(&json!(3)));
        assert_eq!(row.get("distinct_commits"), Some(&json!(2)));
        assert_eq!(row.get("message_length"), Some(&json!(12)));
        assert_eq!(row.get("authors"), Some(&json!(2)));
    }

    #[test]
    fn test_push_author_falls_back_to_name() {
        let events = [push(1, "bob", r#"[{"author":{"name":"Bob"}},{"author":{"name":"Bob"}}]"#)];
        let rows = fold(&DetailAggregator(PushDetail), &events);
        assert_eq!(rows[0].get("authors"), Some(&json!(1)));
    }

    #[test]
    fn test_rows_sorted_by_key() {
        let events = [
            push(1, "zed", "[]"),
            push(2, "amy", "[]"),
            push(3, "mia", "[]"),
        ];
        let rows = fold(&DetailAggregator(PushDetail), &events);
        let users: Vec<_> = rows.iter().map(|r| r.get("user").unwrap().clone()).collect();
        assert_eq!(users, [json!("amy"), json!("mia"), json!("zed")]);
    }

    #[test]
    fn test_other_event_types_are_ignored() {
        let events = [event(
            r#"{"id":"1","type":"ForkEvent","created_at":"2024-02-03T04:05:06Z","payload":{}}"#,
        )];
        assert!(fold(&DetailAggregator(PushDetail), &events).is_empty());
        assert!(fold(&DetailAggregator(WatchDetail), &events).is_empty());
    }

    #[test]
    fn test_create_detail() {
        let events = [
            event(
                r#"{"id":"1","type":"CreateEvent","created_at":"2024-02-03T04:05:06Z",
                    "actor":{"login":"alice"},"repo":{"name":"alice/lib"},
                    "payload":{"ref":"v1.0","ref_type":"tag","master_branch":"main"}}"#,
            ),
            event(
                r#"{"id":"2","type":"CreateEvent","created_at":"2024-02-03T04:06:06Z",
                    "actor":{"login":"alice"},"repo":{"name":"alice/lib"},
                    "payload":{"ref":"v1.0","ref_type":"tag","master_branch":"main"}}"#,
            ),
        ];
        let rows = fold(&DetailAggregator(CreateDetail), &events);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("org"), Some(&Value::Null));
        assert_eq!(rows[0].get("ref_type"), Some(&json!("tag")));
        assert_eq!(rows[0].get("master_branch"), Some(&json!("main")));
        assert_eq!(rows[0].get("events"), Some(&json!(2)));
    }

    #[test]
    fn test_delete_detail() {
        let events = [event(
            r#"{"id":"1","type":"DeleteEvent","created_at":"2024-02-03T04:05:06Z",
                "actor":{"login":"bot"},"repo":{"name":"o/r"},
                "payload":{"ref":"feature","ref_type":"branch","pusher_type":"user"}}"#,
        )];
        let rows = fold(&DetailAggregator(DeleteDetail), &events);
        assert_eq!(rows[0].get("pusher_type"), Some(&json!("user")));
        assert_eq!(rows[0].get("events"), Some(&json!(1)));
    }

    #[test]
    fn test_watch_detail_uses_placeholder_login() {
        let events = [event(
            r#"{"id":"1","type":"WatchEvent","created_at":"2024-02-03T04:05:06Z",
                "actor":{},"repo":{"name":"o/r"},"payload":{"action":"started"}}"#,
        )];
        let aggregator = DetailAggregator(WatchDetail);
        let rows = fold(&aggregator, &events);
        assert_eq!(rows[0].get("user"), Some(&json!("<unknown>")));
        assert_eq!(rows[0].get("action"), Some(&json!("started")));
        assert_eq!(aggregator.columns(), ["date", "user", "repo", "action", "events"]);
    }

    #[test]
    fn test_render_is_idempotent() {
        let aggregator = DetailAggregator(PushDetail);
        let mut state = aggregator.init_window(key());
        aggregator.fold(key(), &mut state, &push(1, "alice", "[]"));
        assert_eq!(aggregator.render(key(), &state), aggregator.render(key(), &state));
    }
}
