//! Bulk import of spreadsheet rows into the recipes table

use errors::{RecipeError, RecipeResult};
use recipe_model::{ImportedRecipes, InsertOutcome};
use serde::Serialize;
use tracing::{error, info};

use crate::rest::RecipeRestClient;

/// Longest failure message kept in the report
const FAILURE_MESSAGE_CHARS: usize = 200;

/// The batch that stopped a migration (rows are 1-based, inclusive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    pub first_row: usize,
    pub last_row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Rows that passed import rules
    pub parsed: usize,
    /// Rows without title or description
    pub skipped: usize,
    pub inserted: usize,
    pub failure: Option<MigrationFailure>,
}

impl MigrationReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.inserted == self.parsed
    }
}

fn shorten(message: &str) -> String {
    message.chars().take(FAILURE_MESSAGE_CHARS).collect()
}

/// Insert `imported` in batches of `batch_size`, stopping at the first failed batch
pub async fn migrate_recipes(
    rest: &RecipeRestClient,
    imported: &ImportedRecipes,
    batch_size: usize,
) -> RecipeResult<MigrationReport> {
    if batch_size == 0 {
        return Err(RecipeError::InvalidParameter {
            param: "batch_size".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    let mut report = MigrationReport {
        parsed: imported.recipes.len(),
        skipped: imported.skipped,
        ..Default::default()
    };

    for (index, batch) in imported.recipes.chunks(batch_size).enumerate() {
        let first_row = index * batch_size + 1;
        let last_row = first_row + batch.len() - 1;

        let message = match rest.insert_batch(batch).await {
            Ok(InsertOutcome::Inserted(count)) => {
                report.inserted += count;
                info!(
                    "Inserted rows {}-{} ({}/{})",
                    first_row, last_row, report.inserted, report.parsed
                );
                continue;
            },
            Ok(InsertOutcome::Rejected(body)) => body,
            Err(e) => e.to_string(),
        };

        error!("Batch {}-{} failed, stopping", first_row, last_row);
        report.failure = Some(MigrationFailure {
            first_row,
            last_row,
            message: shorten(&message),
        });
        break;
    }

    Ok(report)
}
