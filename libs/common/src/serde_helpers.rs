//! Shared Serde helpers
//!
//! Default value functions and deserializers for loosely typed input
//! (CSV cells, environment variables, hand written YAML):
//! - `""` / whitespace only → None
//! - String number `"30"` → Some(30)
//! - Native number `30` → Some(30)

use serde::{Deserialize, Deserializer};

// ============================================================================
// Default Value Functions (for serde #[serde(default = "...")] attributes)
// ============================================================================

/// Default value: true
pub fn bool_true() -> bool {
    true
}

// ============================================================================
// Custom Deserializers
// ============================================================================

/// Deserialize an optional string, trimming it and mapping empty to `None`
pub fn deserialize_trimmed_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

/// Deserialize optional u64
///
/// Supports the following input formats:
/// - `null` → `None`
/// - `""` → `None`
/// - `30` or `"30"` → `Some(30)`
pub fn deserialize_optional_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        String(String),
        Int(u64),
    }

    match Option::<StringOrInt>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrInt::String(s)) if s.trim().is_empty() => Ok(None),
        Some(StringOrInt::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid integer: {}", s))),
        Some(StringOrInt::Int(i)) => Ok(Some(i)),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct SheetRow {
        #[serde(default, deserialize_with = "deserialize_trimmed_string")]
        title: Option<String>,
        #[serde(default, deserialize_with = "deserialize_optional_u64")]
        timeout: Option<u64>,
    }

    #[test]
    fn test_trimmed_string() {
        let row: SheetRow = serde_json::from_str(r#"{"title": "  Focaccia  "}"#).unwrap();
        assert_eq!(row.title.as_deref(), Some("Focaccia"));

        let row: SheetRow = serde_json::from_str(r#"{"title": "   "}"#).unwrap();
        assert_eq!(row.title, None);

        let row: SheetRow = serde_json::from_str(r#"{"title": null}"#).unwrap();
        assert_eq!(row.title, None);
    }

    #[test]
    fn test_optional_u64() {
        let row: SheetRow = serde_json::from_str(r#"{"timeout": "30"}"#).unwrap();
        assert_eq!(row.timeout, Some(30));

        let row: SheetRow = serde_json::from_str(r#"{"timeout": 5}"#).unwrap();
        assert_eq!(row.timeout, Some(5));

        let row: SheetRow = serde_json::from_str(r#"{"timeout": ""}"#).unwrap();
        assert_eq!(row.timeout, None);

        assert!(serde_json::from_str::<SheetRow>(r#"{"timeout": "soon"}"#).is_err());
    }
}
