//! Row-level change notifications

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::recipe::Recipe;

/// Kind of row change; `All` is the `*` subscription filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "*")]
    All,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::All => "*",
        }
    }

    /// Whether an event of kind `other` passes this filter
    pub fn matches(&self, other: ChangeKind) -> bool {
        *self == ChangeKind::All || *self == other
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change event as delivered by the real-time service
///
/// `new` and `old` are the raw row images; which of them is filled depends on
/// the event kind and the table's replica identity. Both the client-side
/// field names (`eventType`, `new`, `old`) and the socket's own (`type`,
/// `record`, `old_record`) are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeChange {
    #[serde(rename = "eventType", alias = "type")]
    pub event_type: ChangeKind,
    pub schema: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_timestamp: Option<String>,
    #[serde(default, alias = "record", deserialize_with = "null_as_empty")]
    pub new: Map<String, Value>,
    #[serde(default, alias = "old_record", deserialize_with = "null_as_empty")]
    pub old: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

impl RecipeChange {
    /// Recipe view of the new row image, if there is one
    pub fn new_recipe(&self) -> Option<Recipe> {
        (!self.new.is_empty()).then(|| Recipe::from(self.new.clone()))
    }

    /// Primary key of the affected row (new image first, then old)
    pub fn row_id(&self) -> Option<&Value> {
        self.new.get("id").or_else(|| self.old.get("id"))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_insert_event() {
        let data = json!({
            "schema": "public",
            "table": "recipes",
            "commit_timestamp": "2024-06-01T12:00:00.000Z",
            "eventType": "INSERT",
            "new": {"id": 7, "title": "Menemen", "published_date": "2024-06-01"},
            "old": {},
            "errors": null
        });

        let change: RecipeChange = serde_json::from_value(data).unwrap();
        assert_eq!(change.event_type, ChangeKind::Insert);
        assert_eq!(change.table, "recipes");
        assert_eq!(change.row_id(), Some(&json!(7)));
        let recipe = change.new_recipe().unwrap();
        assert_eq!(recipe.title(), Some("Menemen"));
    }

    #[test]
    fn test_decode_delete_event_with_null_new() {
        let data = json!({
            "schema": "public",
            "table": "recipes",
            "eventType": "DELETE",
            "new": null,
            "old": {"id": 9}
        });

        let change: RecipeChange = serde_json::from_value(data).unwrap();
        assert!(change.new.is_empty());
        assert!(change.new_recipe().is_none());
        assert_eq!(change.row_id(), Some(&json!(9)));
    }

    #[test]
    fn test_decode_socket_field_names() {
        let data = json!({
            "schema": "public",
            "table": "recipes",
            "commit_timestamp": "2024-06-01T12:00:00Z",
            "type": "UPDATE",
            "record": {"id": 3, "title": "Lahmacun"},
            "old_record": {"id": 3},
            "columns": [{"name": "id", "type": "int8"}],
            "errors": null
        });

        let change: RecipeChange = serde_json::from_value(data).unwrap();
        assert_eq!(change.event_type, ChangeKind::Update);
        assert_eq!(change.new["title"], json!("Lahmacun"));
        assert_eq!(change.old["id"], json!(3));
    }

    #[test]
    fn test_filter_matching() {
        assert!(ChangeKind::All.matches(ChangeKind::Delete));
        assert!(ChangeKind::Update.matches(ChangeKind::Update));
        assert!(!ChangeKind::Insert.matches(ChangeKind::Update));
        assert_eq!(serde_json::to_value(ChangeKind::All).unwrap(), json!("*"));
    }
}
