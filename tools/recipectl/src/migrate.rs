//! `recipectl migrate`

use anyhow::{anyhow, Context, Result};
use colored::*;
use common::config_loader::get_config_value;
use recipe_link::{migrate_recipes, LinkConfig, RecipeRestClient};
use recipe_model::{import_recipes, ImportedRecipes};
use std::fs::File;
use std::path::Path;

fn import_file(path: &Path) -> Result<ImportedRecipes> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    import_recipes(file).with_context(|| format!("Cannot parse {}", path.display()))
}

pub fn dry_run(path: &Path) -> Result<()> {
    let imported = import_file(path)?;
    println!(
        "{} {} rows ready, {} skipped (dry run, nothing inserted)",
        "OK".green(),
        imported.recipes.len(),
        imported.skipped
    );
    Ok(())
}

pub async fn run(config: &LinkConfig, path: &Path, batch_size: Option<usize>) -> Result<()> {
    let imported = import_file(path)?;
    let batch_size = get_config_value(batch_size, "RECIPE_BATCH_SIZE", config.migration.batch_size);

    println!(
        "{} {} rows to insert in batches of {} ({} skipped)",
        "INFO".bright_cyan(),
        imported.recipes.len(),
        batch_size,
        imported.skipped
    );

    let rest = RecipeRestClient::new(config)?;
    let report = migrate_recipes(&rest, &imported, batch_size).await?;

    if let Some(failure) = &report.failure {
        eprintln!(
            "{} rows {}-{}: {}",
            "ERROR".red(),
            failure.first_row,
            failure.last_row,
            failure.message
        );
        return Err(anyhow!(
            "migration stopped after {} of {} rows",
            report.inserted,
            report.parsed
        ));
    }

    println!("{} {} rows inserted", "OK".green(), report.inserted);
    Ok(())
}
