//! `recipectl fetch`

use anyhow::{anyhow, Result};
use colored::*;
use recipe_link::{LinkConfig, RecipeFacade};
use recipe_model::{FetchOutcome, Recipe};

fn print_recipe(recipe: &Recipe) {
    let date = recipe
        .published_date()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "----------".to_string());
    let title = recipe.title().unwrap_or("(untitled)");
    let platform = recipe.platform().unwrap_or("-");

    println!("{}  {}  {}", date.bright_black(), title.bold(), platform.cyan());
    if let Some(link) = recipe.link_url() {
        println!("            {}", link.bright_black());
    }
}

pub async fn run(config: &LinkConfig, json: bool) -> Result<()> {
    let facade = RecipeFacade::from_config(config)?;
    let outcome = match facade.fetch_all().await {
        Ok(outcome) => outcome,
        Err(e) if json => {
            println!("{}", serde_json::to_string_pretty(&e.to_error_info())?);
            return Err(e.into());
        },
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return match outcome {
            FetchOutcome::Data(_) => Ok(()),
            FetchOutcome::Error(_) => Err(anyhow!("backend returned an error")),
        };
    }

    match outcome {
        FetchOutcome::Data(recipes) => {
            for recipe in &recipes {
                print_recipe(recipe);
            }
            println!();
            println!("{} {} recipes", "OK".green(), recipes.len());
            Ok(())
        },
        FetchOutcome::Error(message) => {
            eprintln!("{} {}", "ERROR".red(), message);
            Err(anyhow!("backend returned an error"))
        },
    }
}
