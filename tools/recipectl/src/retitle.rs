//! `recipectl retitle`
//!
//! Rewrites the spreadsheet in place: the original is kept as
//! `<name>.csv.backup` and the new content replaces it atomically.

use anyhow::{Context, Result};
use colored::*;
use recipe_model::{retitle_csv, RetitleReport, TitleRules};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

fn retitle_file(path: &Path) -> Result<RetitleReport> {
    let rules = TitleRules::new()?;

    let backup = backup_path(path);
    fs::copy(path, &backup)
        .with_context(|| format!("Cannot back up {} to {}", path.display(), backup.display()))?;
    info!("Backup written to {}", backup.display());

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot create a temporary file in {}", dir.display()))?;

    let input = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let report = retitle_csv(&rules, input, BufWriter::new(temp.as_file()))?;

    temp.persist(path)
        .with_context(|| format!("Cannot replace {}", path.display()))?;
    Ok(report)
}

pub fn run(path: &Path) -> Result<()> {
    let report = retitle_file(path)?;

    if report.hashtag_column_added {
        println!("{} Hashtag column added", "INFO".bright_cyan());
    }
    println!(
        "{} {} rows, {} titles regenerated",
        "OK".green(),
        report.rows,
        report.titles_updated
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_retitle_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipes.csv");
        let original = "Başlık;Açıklama;Tarih\nTarif7;Kolay pilav #pilav;01.02.2024\n";
        fs::write(&path, original).unwrap();

        let report = retitle_file(&path).unwrap();
        assert_eq!(report.rows, 1);
        assert_eq!(report.titles_updated, 1);
        assert!(report.hashtag_column_added);

        assert_eq!(
            fs::read_to_string(dir.path().join("recipes.csv.backup")).unwrap(),
            original
        );
        let rewritten = fs::read_to_string(&path).unwrap();
        assert_eq!(
            rewritten,
            "\u{feff}Başlık;Açıklama;Tarih;Hashtag\nKolay pilav;Kolay pilav #pilav;01.02.2024;#pilav\n"
        );
    }

    #[test]
    fn test_missing_file_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        assert!(retitle_file(&path).is_err());
        assert!(!backup_path(&path).exists());
    }
}
