//! Output rows.
//!
//! A [`Row`] keeps its fields in insertion order. Sinks rely on that order
//! to derive column lists, so it is stored explicitly instead of depending on
//! map iteration order.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// One output record: ordered `(column, value)` pairs with unique columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field. Re-setting an existing column replaces its value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Builder-style [`Row::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Render a value as a CSV cell. Null becomes an empty cell.
pub fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insertion_order_is_kept() {
        let row = Row::new().with("date", "2024-01-01T00:00:00Z").with("b", 2).with("a", 1);
        let columns: Vec<_> = row.columns().collect();
        assert_eq!(columns, ["date", "b", "a"]);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut row = Row::new().with("a", 1).with("b", 2);
        row.set("a", 10);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("a"), Some(&json!(10)));
        assert_eq!(row.columns().next(), Some("a"));
    }

    #[test]
    fn test_serializes_as_ordered_object() {
        let row = Row::new().with("z", 1).with("a", "x");
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"z":1,"a":"x"}"#);
    }

    #[test]
    fn test_cells() {
        assert_eq!(cell(&Value::Null), "");
        assert_eq!(cell(&json!("refs/heads/main")), "refs/heads/main");
        assert_eq!(cell(&json!(42)), "42");
        assert_eq!(cell(&json!(true)), "true");
        assert_eq!(cell(&json!([1, 2])), "[1,2]");
    }
}
