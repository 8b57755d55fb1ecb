//! Realtime change channels
//!
//! `RealtimeTransport` is the seam between the facade and whatever delivers
//! row changes. Implementations:
//! - `PhoenixTransport`: the backend's WebSocket channel protocol
//! - `MemoryTransport`: in-process, for tests and offline runs

mod memory;
mod phoenix;

pub use memory::MemoryTransport;
pub use phoenix::PhoenixTransport;

use async_trait::async_trait;
use errors::RecipeResult;
use recipe_model::{ChangeKind, RecipeChange};
use std::fmt;
use std::sync::Arc;

use crate::config::LinkConfig;

/// Callback invoked for every delivered change, on the transport's task
pub type ChangeCallback = Arc<dyn Fn(RecipeChange) + Send + Sync + 'static>;

/// What a channel listens to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub schema: String,
    pub table: String,
    pub event: ChangeKind,
}

impl Default for ChannelSpec {
    fn default() -> Self {
        Self {
            name: "recipes-changes".to_string(),
            schema: "public".to_string(),
            table: "recipes".to_string(),
            event: ChangeKind::All,
        }
    }
}

impl ChannelSpec {
    /// All change kinds of the configured table
    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            name: config.realtime.channel.clone(),
            schema: config.realtime.schema.clone(),
            table: config.table.clone(),
            event: ChangeKind::All,
        }
    }

    /// Whether `change` belongs to this channel
    pub fn accepts(&self, change: &RecipeChange) -> bool {
        change.schema == self.schema
            && change.table == self.table
            && self.event.matches(change.event_type)
    }
}

/// Reference to an open channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    id: u64,
    name: String,
}

impl ChannelHandle {
    pub(crate) fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

#[async_trait]
pub trait RealtimeTransport: Send + Sync + 'static {
    /// Open a channel and start delivering its changes to `callback`
    async fn open_channel(
        &self,
        spec: &ChannelSpec,
        callback: ChangeCallback,
    ) -> RecipeResult<ChannelHandle>;

    /// Close a channel; closing an unknown handle is a no-op
    async fn remove_channel(&self, handle: &ChannelHandle) -> RecipeResult<()>;

    /// Whether `handle` still delivers changes. False once the server or
    /// the connection ended it, even before `remove_channel` is called.
    async fn is_channel_open(&self, handle: &ChannelHandle) -> bool;

    /// Number of channels currently open
    async fn open_channel_count(&self) -> usize;
}
