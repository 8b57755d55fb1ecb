//! Result envelopes for expected backend failures
//!
//! A non-success HTTP answer is not an error of the caller's program: it is
//! reported in the envelope so callers branch on it after every call. Only
//! transport failures surface as `Err`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::recipe::Recipe;

/// Outcome of fetching recipes: either the rows or the backend's error text
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Parsed JSON array of the 2xx response
    Data(Vec<Recipe>),
    /// Body text of the non-2xx response, verbatim
    Error(String),
}

impl FetchOutcome {
    pub fn data(&self) -> Option<&[Recipe]> {
        match self {
            Self::Data(rows) => Some(rows),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Data(_) => None,
            Self::Error(message) => Some(message),
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    pub fn into_result(self) -> Result<Vec<Recipe>, String> {
        match self {
            Self::Data(rows) => Ok(rows),
            Self::Error(message) => Err(message),
        }
    }
}

/// Wire form: `{"data": [...], "error": null}` / `{"data": null, "error": "..."}`
#[derive(Serialize)]
struct EnvelopeRef<'a> {
    data: Option<&'a [Recipe]>,
    error: Option<&'a str>,
}

#[derive(Deserialize)]
struct EnvelopeOwned {
    #[serde(default)]
    data: Option<Vec<Recipe>>,
    #[serde(default)]
    error: Option<String>,
}

impl Serialize for FetchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EnvelopeRef {
            data: self.data(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FetchOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match EnvelopeOwned::deserialize(deserializer)? {
            EnvelopeOwned {
                data: Some(rows),
                error: None,
            } => Ok(Self::Data(rows)),
            EnvelopeOwned {
                data: None,
                error: Some(message),
            } => Ok(Self::Error(message)),
            _ => Err(D::Error::custom(
                "envelope must carry exactly one of `data` and `error`",
            )),
        }
    }
}

/// Outcome of a bulk insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Number of rows accepted
    Inserted(usize),
    /// Body text of the non-2xx response, verbatim
    Rejected(String),
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exactly_one_side_populated() {
        let ok = FetchOutcome::Data(vec![Recipe::default()]);
        assert!(ok.data().is_some());
        assert!(ok.error().is_none());

        let failed = FetchOutcome::Error("boom".into());
        assert!(failed.data().is_none());
        assert_eq!(failed.error(), Some("boom"));
        assert_eq!(failed.into_result(), Err("boom".to_string()));
    }

    #[test]
    fn test_wire_shape() {
        let failed = FetchOutcome::Error("boom".into());
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"data": null, "error": "boom"})
        );

        let ok = FetchOutcome::Data(vec![]);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"data": [], "error": null})
        );
    }

    #[test]
    fn test_rejects_ambiguous_envelope() {
        let both = json!({"data": [], "error": "boom"});
        assert!(serde_json::from_value::<FetchOutcome>(both).is_err());

        let neither = json!({"data": null, "error": null});
        assert!(serde_json::from_value::<FetchOutcome>(neither).is_err());

        let ok: FetchOutcome = serde_json::from_value(json!({"data": [{"title": "Pide"}]})).unwrap();
        assert_eq!(ok.data().map(|rows| rows.len()), Some(1));
    }
}
