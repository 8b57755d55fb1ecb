//! Recipe backend link
//!
//! - **RecipeFacade**: `fetch_all`, `subscribe`, `unsubscribe`
//! - **RecipeRestClient**: the `/rest/v1` calls behind the facade
//! - **realtime**: change channel transports (WebSocket and in-memory)
//! - **migrate**: batched insert of spreadsheet rows
//!
//! ```rust,no_run
//! use recipe_link::{LinkConfig, RecipeFacade, SubscribeOutcome};
//!
//! # async fn example() -> errors::RecipeResult<()> {
//! let config = LinkConfig::load(None)?;
//! let facade = RecipeFacade::from_config(&config)?;
//!
//! match facade.fetch_all().await? {
//!     recipe_model::FetchOutcome::Data(rows) => println!("{} recipes", rows.len()),
//!     recipe_model::FetchOutcome::Error(message) => eprintln!("backend said: {}", message),
//! }
//!
//! if let SubscribeOutcome::Subscribed(handle) = facade.subscribe(|change| {
//!     println!("{} on {}", change.event_type, change.table);
//! }).await? {
//!     println!("listening on {}", handle);
//! }
//! facade.unsubscribe().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod facade;
pub mod migrate;
pub mod realtime;
pub mod rest;

pub use config::{LinkConfig, MigrationConfig, RealtimeConfig};
pub use facade::{RecipeFacade, SubscribeOutcome};
pub use migrate::{migrate_recipes, MigrationFailure, MigrationReport};
pub use realtime::{
    ChangeCallback, ChannelHandle, ChannelSpec, MemoryTransport, PhoenixTransport,
    RealtimeTransport,
};
pub use rest::RecipeRestClient;
