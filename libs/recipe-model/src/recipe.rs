//! Recipe rows

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Platform used when the spreadsheet leaves it blank
pub const DEFAULT_PLATFORM: &str = "Instagram";

/// Column names of the `recipes` table the tools read
pub mod columns {
    pub const ID: &str = "id";
    pub const TITLE: &str = "title";
    pub const PLATFORM: &str = "platform";
    pub const IMAGE_URL: &str = "image_url";
    pub const LINK_URL: &str = "link_url";
    pub const DESCRIPTION: &str = "description";
    pub const PUBLISHED_DATE: &str = "published_date";
    pub const HASHTAGS: &str = "hashtags";
}

/// A row of the `recipes` table as returned by the backend
///
/// The row is kept exactly as received: the table owns its columns and a
/// fetch never rejects a row for its shape. The accessors decode the known
/// columns on demand and return `None` when a column is missing or holds
/// something else.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipe(Map<String, Value>);

impl Recipe {
    /// Raw value of any column
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    fn text(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Value::as_str)
    }

    /// Primary key as sent by the backend, whatever its type
    pub fn id(&self) -> Option<&Value> {
        self.get(columns::ID)
    }

    pub fn title(&self) -> Option<&str> {
        self.text(columns::TITLE)
    }

    pub fn platform(&self) -> Option<&str> {
        self.text(columns::PLATFORM)
    }

    pub fn image_url(&self) -> Option<&str> {
        self.text(columns::IMAGE_URL)
    }

    pub fn link_url(&self) -> Option<&str> {
        self.text(columns::LINK_URL)
    }

    pub fn description(&self) -> Option<&str> {
        self.text(columns::DESCRIPTION)
    }

    /// Calendar date of `published_date`; `YYYY-MM-DD` and timestamps are read,
    /// anything else gives `None`
    pub fn published_date(&self) -> Option<NaiveDate> {
        self.text(columns::PUBLISHED_DATE).and_then(parse_published_date)
    }

    /// Individual hashtags, in order
    ///
    /// Accepts the space separated text column as well as a JSON array of
    /// strings.
    pub fn hashtag_list(&self) -> Vec<&str> {
        match self.get(columns::HASHTAGS) {
            Some(Value::String(tags)) => tags.split_whitespace().collect(),
            Some(Value::Array(tags)) => tags.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Map<String, Value>> for Recipe {
    fn from(row: Map<String, Value>) -> Self {
        Self(row)
    }
}

fn parse_published_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    // Timestamp without offset: "2024-05-01T10:00:00" or "2024-05-01 10:00:00"
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Insert shape of a recipe
///
/// Every column is always sent (absent values as `null`), matching what the
/// table expects from a bulk insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecipe {
    pub title: Option<String>,
    pub platform: String,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub description: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub hashtags: Option<String>,
}

impl Default for NewRecipe {
    fn default() -> Self {
        Self {
            title: None,
            platform: DEFAULT_PLATFORM.to_string(),
            image_url: None,
            link_url: None,
            description: None,
            published_date: None,
            hashtags: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recipe_reads_known_columns() {
        let row = json!({
            "id": 42,
            "title": "Focaccia",
            "platform": "Instagram",
            "published_date": "2024-03-09",
            "created_at": "2024-03-10T08:00:00+00:00",
            "hashtags": "#ekmek #focaccia"
        });

        let recipe: Recipe = serde_json::from_value(row.clone()).unwrap();
        assert_eq!(recipe.title(), Some("Focaccia"));
        assert_eq!(recipe.platform(), Some("Instagram"));
        assert_eq!(recipe.link_url(), None);
        assert_eq!(recipe.published_date(), NaiveDate::from_ymd_opt(2024, 3, 9));
        assert_eq!(recipe.id(), Some(&json!(42)));
        assert_eq!(recipe.hashtag_list(), vec!["#ekmek", "#focaccia"]);

        assert_eq!(serde_json::to_value(&recipe).unwrap(), row);
    }

    #[test]
    fn test_unexpected_shapes_are_kept_not_rejected() {
        let row = json!({
            "id": "b7a1",
            "title": 17,
            "published_date": "01.06.2024",
            "hashtags": ["#a", "#b"]
        });

        let recipe: Recipe = serde_json::from_value(row.clone()).unwrap();
        assert_eq!(recipe.title(), None);
        assert_eq!(recipe.published_date(), None);
        assert_eq!(recipe.hashtag_list(), vec!["#a", "#b"]);
        assert_eq!(serde_json::to_value(&recipe).unwrap(), row);
    }

    #[test]
    fn test_published_date_variants() {
        let date = |raw: Value| {
            let mut row = Map::new();
            row.insert(columns::PUBLISHED_DATE.to_string(), raw);
            Recipe::from(row).published_date()
        };

        assert_eq!(
            date(json!("2023-12-31T23:00:00+00:00")),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
        assert_eq!(
            date(json!("2023-01-02 10:00:00")),
            NaiveDate::from_ymd_opt(2023, 1, 2)
        );
        assert_eq!(date(Value::Null), None);
        assert_eq!(date(json!("yesterday")), None);
    }

    #[test]
    fn test_timestamp_survives_round_trip() {
        let row = json!({"id": 1, "published_date": "2024-06-01T10:00:00+00:00"});
        let recipe: Recipe = serde_json::from_value(row.clone()).unwrap();
        assert_eq!(serde_json::to_value(&recipe).unwrap(), row);
    }

    #[test]
    fn test_new_recipe_serializes_nulls() {
        let recipe = NewRecipe {
            title: Some("Tiramisu".into()),
            published_date: NaiveDate::from_ymd_opt(2024, 1, 5),
            ..Default::default()
        };
        let value = serde_json::to_value(&recipe).unwrap();
        assert_eq!(
            value,
            json!({
                "title": "Tiramisu",
                "platform": "Instagram",
                "image_url": null,
                "link_url": null,
                "description": null,
                "published_date": "2024-01-05",
                "hashtags": null
            })
        );
    }
}
