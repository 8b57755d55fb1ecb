//! Recipe spreadsheet import
//!
//! The spreadsheet is `;` separated with Turkish headers; ASCII spellings of
//! the headers are accepted too.

use chrono::NaiveDate;
use common::serde_helpers::deserialize_trimmed_string;
use errors::{validation_error, RecipeResult};
use serde::Deserialize;
use std::io::Read;
use tracing::debug;

use crate::recipe::{NewRecipe, DEFAULT_PLATFORM};
use crate::CSV_DELIMITER;

#[derive(Debug, Deserialize)]
struct CsvRecipeRow {
    #[serde(rename = "Başlık", alias = "Baslik", default, deserialize_with = "deserialize_trimmed_string")]
    title: Option<String>,

    #[serde(rename = "Platform", default, deserialize_with = "deserialize_trimmed_string")]
    platform: Option<String>,

    #[serde(
        rename = "Görsel URL",
        alias = "Gorsel URL",
        default,
        deserialize_with = "deserialize_trimmed_string"
    )]
    image_url: Option<String>,

    #[serde(rename = "Link", default, deserialize_with = "deserialize_trimmed_string")]
    link_url: Option<String>,

    #[serde(rename = "Açıklama", alias = "Aciklama", default, deserialize_with = "deserialize_trimmed_string")]
    description: Option<String>,

    #[serde(rename = "Hashtag", default, deserialize_with = "deserialize_trimmed_string")]
    hashtags: Option<String>,

    #[serde(rename = "Tarih", default, deserialize_with = "deserialize_trimmed_string")]
    date: Option<String>,
}

impl CsvRecipeRow {
    /// `None` when the row has neither a title nor a description
    fn into_new_recipe(self) -> Option<NewRecipe> {
        if self.title.is_none() && self.description.is_none() {
            return None;
        }
        Some(NewRecipe {
            title: self.title,
            platform: self
                .platform
                .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            image_url: self.image_url,
            link_url: self.link_url,
            description: self.description,
            published_date: self.date.as_deref().and_then(parse_date),
            hashtags: self.hashtags,
        })
    }
}

/// Rows ready for insertion plus the number of rows left out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedRecipes {
    pub recipes: Vec<NewRecipe>,
    pub skipped: usize,
}

/// Parse `DD.MM.YYYY` (day and month may be one digit)
///
/// Anything else, including impossible dates, yields `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.contains('.') {
        return None;
    }
    let parts: Vec<&str> = raw.split('.').collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };
    let day: u32 = day.trim().parse().ok()?;
    let month: u32 = month.trim().parse().ok()?;
    let year: i32 = year.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Read the spreadsheet and map every usable row
pub fn import_recipes<R: Read>(reader: R) -> RecipeResult<ImportedRecipes> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(CSV_DELIMITER)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?;
    let known = ["Başlık", "Baslik", "Açıklama", "Aciklama"];
    if !headers.iter().any(|h| known.contains(&h.trim())) {
        return Err(validation_error!(
            "spreadsheet has neither a Başlık nor an Açıklama column"
        ));
    }

    let mut imported = ImportedRecipes::default();
    for (index, row) in csv_reader.deserialize::<CsvRecipeRow>().enumerate() {
        let row = row?;
        match row.into_new_recipe() {
            Some(recipe) => imported.recipes.push(recipe),
            None => {
                debug!("Row {} has no title or description, skipped", index + 1);
                imported.skipped += 1;
            },
        }
    }

    Ok(imported)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("09.03.2024"), NaiveDate::from_ymd_opt(2024, 3, 9));
        assert_eq!(parse_date(" 1.2.2023 "), NaiveDate::from_ymd_opt(2023, 2, 1));
        assert_eq!(parse_date("2024-03-09"), None);
        assert_eq!(parse_date("31.02.2024"), None);
        assert_eq!(parse_date("1.2"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_import_maps_and_skips() {
        let csv = "\u{feff}Başlık;Platform;Görsel URL;Link;Açıklama;Tarih;Hashtag\n\
                   Focaccia;;https://img/1.jpg;https://insta/p/1;Yumuşacık focaccia;09.03.2024;#ekmek\n\
                   ;;;;;;\n\
                   ;YouTube;;https://yt/2;Sadece açıklama;bad;\n";

        let imported = import_recipes(csv.as_bytes()).unwrap();
        assert_eq!(imported.skipped, 1);
        assert_eq!(imported.recipes.len(), 2);

        let first = &imported.recipes[0];
        assert_eq!(first.title.as_deref(), Some("Focaccia"));
        assert_eq!(first.platform, "Instagram");
        assert_eq!(first.image_url.as_deref(), Some("https://img/1.jpg"));
        assert_eq!(first.published_date, NaiveDate::from_ymd_opt(2024, 3, 9));
        assert_eq!(first.hashtags.as_deref(), Some("#ekmek"));

        let second = &imported.recipes[1];
        assert_eq!(second.title, None);
        assert_eq!(second.platform, "YouTube");
        assert_eq!(second.description.as_deref(), Some("Sadece açıklama"));
        assert_eq!(second.published_date, None);
    }

    #[test]
    fn test_import_rejects_foreign_sheet() {
        let csv = "name;url\nPide;https://x\n";
        assert!(matches!(
            import_recipes(csv.as_bytes()),
            Err(errors::RecipeError::Validation(_))
        ));
    }

    #[test]
    fn test_import_ascii_headers() {
        let csv = "Baslik;Aciklama;Gorsel URL\nPide;Kıymalı pide;https://img/p.jpg\n";
        let imported = import_recipes(csv.as_bytes()).unwrap();
        assert_eq!(imported.recipes.len(), 1);
        assert_eq!(imported.recipes[0].title.as_deref(), Some("Pide"));
        assert_eq!(
            imported.recipes[0].image_url.as_deref(),
            Some("https://img/p.jpg")
        );
    }
}
