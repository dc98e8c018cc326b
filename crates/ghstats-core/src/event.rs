//! GH Archive event records.
//!
//! Only the fields the aggregators read are modelled as typed fields. The
//! type-specific `payload` stays a generic JSON value so new event kinds
//! decode without changes here.

use crate::UNKNOWN_LOGIN;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single archive event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Source-unique event identifier (a decimal string in GH Archive).
    pub id: String,

    /// Event type tag, e.g. `PushEvent`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Creation time, UTC, second precision.
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub actor: Actor,

    #[serde(default)]
    pub repo: Repo,

    /// Type-specific payload.
    #[serde(default)]
    pub payload: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<Org>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Org {
    #[serde(default)]
    pub login: Option<String>,
}

impl Event {
    /// Parse one archive line.
    pub fn from_json(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }

    /// Parse one archive line from raw bytes (UTF-8 is validated by the parser).
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Actor login, or [`UNKNOWN_LOGIN`] when the archive omits it.
    pub fn actor_login(&self) -> &str {
        self.actor.login.as_deref().unwrap_or(UNKNOWN_LOGIN)
    }

    /// Organization login, if the event belongs to one.
    pub fn org_login(&self) -> Option<&str> {
        self.org.as_ref().and_then(|o| o.login.as_deref())
    }

    /// String field of the payload.
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(Value::as_str)
    }

    /// Unsigned integer field of the payload.
    pub fn payload_u64(&self, field: &str) -> Option<u64> {
        self.payload.get(field).and_then(Value::as_u64)
    }

    /// Commits listed in a push payload (GH Archive truncates the list at 20).
    pub fn payload_commits(&self) -> &[Value] {
        self.payload
            .get("commits")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of commits in a push.
    ///
    /// Prefers the payload's `size`, which counts commits beyond the listed ones.
    pub fn push_size(&self) -> u64 {
        self.payload_u64("size")
            .unwrap_or(self.payload_commits().len() as u64)
    }

    /// Type tag refined by the payload.
    ///
    /// - Push events get their commit count: `PushEvent-3`
    /// - Events with a payload `action` get it appended: `IssuesEvent-opened`
    /// - Everything else keeps the plain type
    pub fn normalized_type(&self) -> String {
        if self.kind == "PushEvent" {
            return format!("{}-{}", self.kind, self.push_size());
        }
        match self.payload_str("action") {
            Some(action) => format!("{}-{}", self.kind, action),
            None => self.kind.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_line() -> &'static str {
        r#"{"id":"100","type":"PushEvent","created_at":"2024-01-01T10:11:12Z",
            "actor":{"id":1,"login":"alice"},"repo":{"id":2,"name":"alice/demo"},
            "payload":{"ref":"refs/heads/main","size":3,"distinct_size":2,
                       "commits":[{"sha":"a","message":"one"},{"sha":"b","message":"two"}]},
            "public":true}"#
    }

    #[test]
    fn test_decode_push_event() {
        let event = Event::from_json(push_line()).unwrap();
        assert_eq!(event.id, "100");
        assert_eq!(event.kind, "PushEvent");
        assert_eq!(event.actor_login(), "alice");
        assert_eq!(event.repo.name, "alice/demo");
        assert_eq!(event.org_login(), None);
        assert_eq!(event.payload_str("ref"), Some("refs/heads/main"));
        assert_eq!(event.payload_commits().len(), 2);
        assert_eq!(event.created_at.to_rfc3339(), "2024-01-01T10:11:12+00:00");
    }

    #[test]
    fn test_push_normalized_type_uses_size() {
        let event = Event::from_json(push_line()).unwrap();
        assert_eq!(event.normalized_type(), "PushEvent-3");
    }

    #[test]
    fn test_push_size_falls_back_to_commit_list() {
        let event = Event::from_json(
            r#"{"id":"1","type":"PushEvent","created_at":"2024-01-01T00:00:00Z",
                "payload":{"commits":[{"sha":"a"}]}}"#,
        )
        .unwrap();
        assert_eq!(event.normalized_type(), "PushEvent-1");
    }

    #[test]
    fn test_action_suffix() {
        let event = Event::from_json(
            r#"{"id":"2","type":"IssuesEvent","created_at":"2024-01-01T00:00:00Z",
                "actor":{"login":"bob"},"repo":{"name":"bob/x"},
                "payload":{"action":"opened"}}"#,
        )
        .unwrap();
        assert_eq!(event.normalized_type(), "IssuesEvent-opened");
    }

    #[test]
    fn test_plain_type_without_action() {
        let event = Event::from_json(
            r#"{"id":"3","type":"ForkEvent","created_at":"2024-01-01T00:00:00Z","payload":{}}"#,
        )
        .unwrap();
        assert_eq!(event.normalized_type(), "ForkEvent");
    }

    #[test]
    fn test_missing_login_uses_placeholder() {
        let event = Event::from_json(
            r#"{"id":"4","type":"WatchEvent","created_at":"2024-01-01T00:00:00Z",
                "actor":{"id":7},"repo":{"name":"x/y"},"org":{"login":"acme"}}"#,
        )
        .unwrap();
        assert_eq!(event.actor_login(), UNKNOWN_LOGIN);
        assert_eq!(event.org_login(), Some("acme"));
        assert!(event.payload.is_null());
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let result = Event::from_json(r#"{"type":"WatchEvent","created_at":"2024-01-01T00:00:00Z"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_slice_rejects_invalid_utf8() {
        assert!(Event::from_slice(b"{\"id\":\"\xff\"}").is_err());
    }
}
