//! Recipe data model
//!
//! Types shared by the link library and the CLI:
//!
//! - **Recipe / NewRecipe**: a row of the remote `recipes` table and its insert shape
//! - **FetchOutcome**: the data-or-error envelope returned by a fetch
//! - **RecipeChange**: a row-level change notification
//! - **csv_import / titles**: rules for turning the recipe spreadsheet into rows

pub mod change;
pub mod csv_import;
pub mod envelope;
pub mod recipe;
pub mod titles;

pub use change::{ChangeKind, RecipeChange};
pub use csv_import::{import_recipes, parse_date, ImportedRecipes};
pub use envelope::{FetchOutcome, InsertOutcome};
pub use recipe::{columns, NewRecipe, Recipe, DEFAULT_PLATFORM};
pub use titles::{is_placeholder_title, retitle_csv, RetitleReport, TitleRules, UNTITLED};

/// CSV delimiter of the recipe spreadsheet
pub const CSV_DELIMITER: u8 = b';';
