//! Flat per-event rows.

use crate::Result;
use crate::row::Row;
use crate::window::Exporter;
use ghstats_core::{Event, ISO_SECONDS};
use serde_json::Value;

const COLUMNS: &[&str] = &["id", "date", "type", "actor", "repo", "action", "size"];

/// One row per event, no windowing.
///
/// `size` is the push size for push events and empty otherwise.
#[derive(Debug, Clone, Default)]
pub struct EventRows {
    events: usize,
}

impl EventRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> usize {
        self.events
    }
}

impl Exporter for EventRows {
    fn name(&self) -> &str {
        "events"
    }

    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn digest(&mut self, event: &Event, _is_final: bool) -> Result<Vec<Row>> {
        self.events += 1;
        let size = if event.kind == "PushEvent" {
            Value::from(event.push_size())
        } else {
            Value::Null
        };
        let row = Row::new()
            .with("id", event.id.as_str())
            .with("date", event.created_at.format(ISO_SECONDS).to_string())
            .with("type", event.kind.as_str())
            .with("actor", event.actor_login())
            .with("repo", event.repo.name.as_str())
            .with("action", event.payload_str("action").map_or(Value::Null, Value::from))
            .with("size", size);
        Ok(vec![row])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_one_row_per_event() {
        let mut exporter = EventRows::new();
        let push = Event::from_json(
            r#"{"id":"10","type":"PushEvent","created_at":"2024-01-01T00:00:07Z",
                "actor":{"login":"a"},"repo":{"name":"a/b"},"payload":{"size":4}}"#,
        )
        .unwrap();
        let issue = Event::from_json(
            r#"{"id":"11","type":"IssuesEvent","created_at":"2024-01-01T00:00:08Z",
                "actor":{"login":"c"},"repo":{"name":"c/d"},"payload":{"action":"closed"}}"#,
        )
        .unwrap();

        let rows = exporter.digest(&push, false).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("date"), Some(&json!("2024-01-01T00:00:07Z")));
        assert_eq!(rows[0].get("size"), Some(&json!(4)));
        assert_eq!(rows[0].get("action"), Some(&Value::Null));

        let rows = exporter.digest(&issue, true).unwrap();
        assert_eq!(rows[0].get("action"), Some(&json!("closed")));
        assert_eq!(rows[0].get("size"), Some(&Value::Null));
        assert_eq!(exporter.events(), 2);

        let columns: Vec<_> = rows[0].columns().map(String::from).collect();
        assert_eq!(columns, exporter.columns());
    }
}
