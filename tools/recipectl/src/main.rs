//! recipectl - command line access to the recipe backend
//!
//! Fetches and watches the `recipes` table, migrates the recipe spreadsheet
//! into it and repairs placeholder titles in the spreadsheet.

mod fetch;
mod migrate;
mod retitle;
mod watch;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use common::config_loader::get_string_config;
use common::logging::{self, LogConfig};
use errors::{config_error, ClassifiedError, RecipeError};
use recipe_link::LinkConfig;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "recipectl")]
#[command(about = "Recipe backend tool")]
#[command(long_about = "Recipe backend tool

Commands:
  fetch       Print every recipe, newest first
  watch       Print recipe changes as they happen
  migrate     Insert the recipe spreadsheet into the backend
  retitle     Regenerate placeholder titles and hashtags in the spreadsheet

Backend settings come from --config (YAML) and RECIPE_* variables,
e.g. RECIPE_BACKEND_URL and RECIPE_API_KEY.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(short, long, global = true, env = "RECIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (default: RECIPE_LOG_LEVEL or info)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write a daily log file under RECIPE_LOG_DIR (default ./logs)
    #[arg(long, global = true)]
    log_file: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every recipe, newest first
    Fetch {
        /// Print the result envelope as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print recipe changes until Ctrl+C
    Watch,

    /// Insert the rows of a recipe spreadsheet
    Migrate {
        /// `;` separated spreadsheet
        csv: PathBuf,

        /// Rows per insert request (default: config, then 500)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Parse and report without inserting
        #[arg(long)]
        dry_run: bool,
    },

    /// Fill the Hashtag column and regenerate `TarifN` titles in place
    Retitle {
        /// `;` separated spreadsheet
        csv: PathBuf,
    },
}

/// `error`, `warn`, `info`, `debug` or `trace`, any case
fn parse_log_level(level: &str) -> Result<tracing::Level, RecipeError> {
    level.trim().parse().map_err(|_| {
        config_error!(
            "Invalid log level '{}', expected error, warn, info, debug or trace",
            level
        )
    })
}

fn load_link_config(path: Option<&Path>) -> Result<LinkConfig> {
    LinkConfig::load(path).context("Failed to load configuration")
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        match e.downcast_ref::<RecipeError>() {
            Some(err) => eprintln!("{} [{}] {:#}", "ERROR".red(), err.error_code(), e),
            None => eprintln!("{} {:#}", "ERROR".red(), e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    let level = get_string_config(cli.log_level.clone(), "RECIPE_LOG_LEVEL", "info");
    let console_level = parse_log_level(&level)?;
    if cli.log_file {
        logging::init_log_root(None);
    }
    logging::init_with_config(LogConfig {
        service_name: "recipectl".to_string(),
        console_level,
        enable_file: cli.log_file,
        ..Default::default()
    })
    .map_err(|e| config_error!("Failed to initialize logging: {}", e))?;

    match cli.command {
        Commands::Fetch { json } => {
            let config = load_link_config(cli.config.as_deref())?;
            fetch::run(&config, json).await
        },
        Commands::Watch => {
            let config = load_link_config(cli.config.as_deref())?;
            watch::run(&config).await
        },
        Commands::Migrate {
            csv,
            batch_size,
            dry_run,
        } => {
            if dry_run {
                migrate::dry_run(&csv)
            } else {
                let config = load_link_config(cli.config.as_deref())?;
                migrate::run(&config, &csv, batch_size).await
            }
        },
        Commands::Retitle { csv } => retitle::run(&csv),
    }
}
