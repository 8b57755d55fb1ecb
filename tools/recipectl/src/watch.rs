//! `recipectl watch`

use anyhow::{anyhow, Result};
use colored::*;
use common::shutdown::ShutdownListener;
use recipe_link::{LinkConfig, RecipeFacade, SubscribeOutcome};
use recipe_model::{ChangeKind, RecipeChange};
use std::time::Duration;
use tracing::info;

/// How often a lost channel is noticed
const LIVENESS_CHECK: Duration = Duration::from_secs(5);

fn print_change(change: &RecipeChange) {
    let kind = match change.event_type {
        ChangeKind::Insert => "INSERT".green(),
        ChangeKind::Update => "UPDATE".yellow(),
        ChangeKind::Delete => "DELETE".red(),
        ChangeKind::All => "*".normal(),
    };
    let id = change
        .row_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "?".to_string());
    let title = change
        .new_recipe()
        .and_then(|recipe| recipe.title().map(str::to_string))
        .unwrap_or_default();

    println!(
        "{} {} id={} {}",
        change.commit_timestamp.as_deref().unwrap_or("").bright_black(),
        kind,
        id,
        title
    );
}

pub async fn run(config: &LinkConfig) -> Result<()> {
    let facade = RecipeFacade::from_config(config)?;
    let mut shutdown = ShutdownListener::new();

    match facade.subscribe(|change| print_change(&change)).await? {
        SubscribeOutcome::Subscribed(handle) => {
            println!(
                "{} Listening on {} (Ctrl+C to stop)",
                "INFO".bright_cyan(),
                handle.name()
            );
        },
        SubscribeOutcome::Unavailable => {
            println!(
                "{} Realtime is disabled, nothing to watch",
                "WARN".yellow()
            );
            return Ok(());
        },
    }

    let mut liveness = tokio::time::interval(LIVENESS_CHECK);
    loop {
        tokio::select! {
            signal = shutdown.recv() => {
                info!("{} received, leaving channel", signal);
                break;
            }
            _ = liveness.tick() => {
                if !facade.is_subscribed().await {
                    return Err(anyhow!("channel closed by the server"));
                }
            }
        }
    }

    facade.unsubscribe().await?;
    Ok(())
}
