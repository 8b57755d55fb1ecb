//! Title generation and hashtag extraction for the recipe spreadsheet
//!
//! Early exports named every post `Tarif1`, `Tarif2`, ...; those placeholder
//! titles are rebuilt from the description, and the hashtags found in the
//! description are collected into their own column.

use errors::{RecipeError, RecipeResult};
use regex::Regex;
use std::io::{Read, Write};
use tracing::debug;

use crate::CSV_DELIMITER;

/// Title used when nothing usable can be derived
pub const UNTITLED: &str = "İsimsiz Tarif";

const MAX_TITLE_CHARS: usize = 50;
const TITLE_HEADER: &str = "Başlık";
const DESCRIPTION_HEADER: &str = "Açıklama";
const DATE_HEADER: &str = "Tarih";
const HASHTAG_HEADER: &str = "Hashtag";

/// Compiled patterns used by the title rules
pub struct TitleRules {
    hashtag: Regex,
    disallowed: Regex,
    sentence_end: Regex,
}

impl TitleRules {
    pub fn new() -> RecipeResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| RecipeError::Internal(format!("Regex error: {}", e)))
        };
        Ok(Self {
            hashtag: compile(r"#\w+")?,
            disallowed: compile(r"[^\w\s.,!?çÇğĞıİöÖşŞüÜ-]")?,
            sentence_end: compile(r"[.!?]+")?,
        })
    }

    /// All `#word` tokens of `text`, in order
    pub fn extract_hashtags<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.hashtag.find_iter(text).map(|m| m.as_str()).collect()
    }

    /// Build a short title out of a post description
    pub fn generate_title(&self, description: &str) -> String {
        if description.is_empty() {
            return UNTITLED.to_string();
        }

        let text = description.trim();
        let text = self.hashtag.replace_all(text, "");
        let text = self.disallowed.replace_all(&text, "");

        let mut first_line = text.split('\n').next().unwrap_or("").trim().to_string();

        if first_line.chars().count() > MAX_TITLE_CHARS {
            if let Some(sentence) = self.sentence_end.split(&first_line).next() {
                first_line = sentence.trim().to_string();
            }
        }

        if first_line.chars().count() > MAX_TITLE_CHARS {
            let head: String = first_line.chars().take(MAX_TITLE_CHARS - 3).collect();
            first_line = format!("{}...", head);
        }

        if first_line.is_empty() {
            // Fall back to the first capitalised word, e.g. "Tiramisu"
            return text
                .split_whitespace()
                .find(|word| {
                    word.chars().count() > 3
                        && word.chars().next().is_some_and(char::is_uppercase)
                })
                .map(str::to_string)
                .unwrap_or_else(|| UNTITLED.to_string());
        }

        first_line
    }
}

/// `Tarif` followed by digits only
pub fn is_placeholder_title(title: &str) -> bool {
    title
        .strip_prefix("Tarif")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Summary of a retitle run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetitleReport {
    pub rows: usize,
    pub titles_updated: usize,
    pub hashtag_column_added: bool,
}

/// Rewrite the spreadsheet read from `reader` into `writer`
///
/// Adds the `Hashtag` column (after `Tarih`, or last) when missing, refills it
/// from every description, and regenerates placeholder titles. Output keeps
/// the spreadsheet's UTF-8 BOM and `;` delimiter.
pub fn retitle_csv<R: Read, W: Write>(
    rules: &TitleRules,
    reader: R,
    mut writer: W,
) -> RecipeResult<RetitleReport> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(CSV_DELIMITER)
        .flexible(true)
        .from_reader(reader);

    let in_headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let position = |name: &str| in_headers.iter().position(|h| h == name);

    let mut out_headers = in_headers.clone();
    let hashtag_column_added = position(HASHTAG_HEADER).is_none();
    if hashtag_column_added {
        match position(DATE_HEADER) {
            Some(idx) => out_headers.insert(idx + 1, HASHTAG_HEADER.to_string()),
            None => out_headers.push(HASHTAG_HEADER.to_string()),
        }
    }

    let title_idx = position(TITLE_HEADER);
    let description_idx = position(DESCRIPTION_HEADER);

    writer.write_all("\u{feff}".as_bytes())?;
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(CSV_DELIMITER)
        .from_writer(writer);
    csv_writer.write_record(&out_headers)?;

    let mut report = RetitleReport {
        hashtag_column_added,
        ..Default::default()
    };

    for record in csv_reader.records() {
        let record = record?;
        report.rows += 1;

        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");
        let description = cell(description_idx);
        let current_title = cell(title_idx);

        let hashtags = rules.extract_hashtags(description).join(" ");
        let new_title = if is_placeholder_title(current_title) {
            let title = rules.generate_title(description);
            debug!(
                "Row {}: '{}' -> '{}'",
                report.rows, current_title, title
            );
            report.titles_updated += 1;
            Some(title)
        } else {
            None
        };

        let out: Vec<&str> = out_headers
            .iter()
            .map(|header| match header.as_str() {
                HASHTAG_HEADER => hashtags.as_str(),
                TITLE_HEADER => new_title.as_deref().unwrap_or(current_title),
                other => cell(in_headers.iter().position(|h| h == other)),
            })
            .collect();
        csv_writer.write_record(&out)?;
    }

    csv_writer.flush()?;

    Ok(report)
}
