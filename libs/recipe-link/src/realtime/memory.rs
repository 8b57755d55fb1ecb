//! In-process realtime transport
//!
//! Keeps channels in a map; `emit` delivers a change to every open channel
//! whose spec accepts it, synchronously on the caller's task.
//! `close_remote` plays the server ending a channel on its own.

use async_trait::async_trait;
use errors::RecipeResult;
use recipe_model::RecipeChange;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::{ChangeCallback, ChannelHandle, ChannelSpec, RealtimeTransport};

struct MemoryChannel {
    handle: ChannelHandle,
    spec: ChannelSpec,
    callback: ChangeCallback,
    closed: bool,
}

pub struct MemoryTransport {
    channels: RwLock<HashMap<u64, MemoryChannel>>,
    next_id: AtomicU64,
    opened_total: AtomicU64,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            opened_total: AtomicU64::new(0),
        }
    }

    /// Deliver `change` to matching channels, returns how many got it
    pub async fn emit(&self, change: RecipeChange) -> usize {
        let callbacks: Vec<ChangeCallback> = {
            let channels = self.channels.read().await;
            channels
                .values()
                .filter(|channel| !channel.closed && channel.spec.accepts(&change))
                .map(|channel| channel.callback.clone())
                .collect()
        };

        for callback in &callbacks {
            callback(change.clone());
        }
        callbacks.len()
    }

    /// Handles of the channels currently open, ordered by id
    pub async fn open_channels(&self) -> Vec<ChannelHandle> {
        let channels = self.channels.read().await;
        let mut handles: Vec<ChannelHandle> =
            channels.values().map(|c| c.handle.clone()).collect();
        handles.sort_by_key(ChannelHandle::id);
        handles
    }

    /// End a channel from the far side: it stops delivering and reports
    /// closed, but stays registered until `remove_channel`
    pub async fn close_remote(&self, handle: &ChannelHandle) -> bool {
        match self.channels.write().await.get_mut(&handle.id()) {
            Some(channel) => {
                channel.closed = true;
                debug!("Memory channel {} closed remotely", handle);
                true
            },
            None => false,
        }
    }

    /// Channels opened over the transport's lifetime
    pub fn opened_total(&self) -> u64 {
        self.opened_total.load(Ordering::Relaxed)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeTransport for MemoryTransport {
    async fn open_channel(
        &self,
        spec: &ChannelSpec,
        callback: ChangeCallback,
    ) -> RecipeResult<ChannelHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = ChannelHandle::new(id, spec.name.clone());

        self.channels.write().await.insert(
            id,
            MemoryChannel {
                handle: handle.clone(),
                spec: spec.clone(),
                callback,
                closed: false,
            },
        );
        self.opened_total.fetch_add(1, Ordering::Relaxed);
        debug!("Memory channel {} opened", handle);
        Ok(handle)
    }

    async fn remove_channel(&self, handle: &ChannelHandle) -> RecipeResult<()> {
        if self.channels.write().await.remove(&handle.id()).is_some() {
            debug!("Memory channel {} removed", handle);
        }
        Ok(())
    }

    async fn is_channel_open(&self, handle: &ChannelHandle) -> bool {
        self.channels
            .read()
            .await
            .get(&handle.id())
            .is_some_and(|channel| !channel.closed)
    }

    async fn open_channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use recipe_model::ChangeKind;
    use serde_json::Map;
    use std::sync::{Arc, Mutex};

    fn change(table: &str, kind: ChangeKind) -> RecipeChange {
        RecipeChange {
            event_type: kind,
            schema: "public".to_string(),
            table: table.to_string(),
            commit_timestamp: None,
            new: Map::new(),
            old: Map::new(),
            errors: None,
        }
    }

    #[tokio::test]
    async fn test_emit_reaches_matching_channels_only() {
        let transport = MemoryTransport::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let handle = transport
            .open_channel(
                &ChannelSpec::default(),
                Arc::new(move |c: RecipeChange| sink.lock().unwrap().push(c.event_type)),
            )
            .await
            .unwrap();
        assert_eq!(handle.name(), "recipes-changes");

        assert_eq!(transport.emit(change("recipes", ChangeKind::Insert)).await, 1);
        assert_eq!(transport.emit(change("comments", ChangeKind::Insert)).await, 0);
        assert_eq!(transport.emit(change("recipes", ChangeKind::Delete)).await, 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ChangeKind::Insert, ChangeKind::Delete]
        );

        transport.remove_channel(&handle).await.unwrap();
        transport.remove_channel(&handle).await.unwrap();
        assert_eq!(transport.open_channel_count().await, 0);
        assert_eq!(transport.emit(change("recipes", ChangeKind::Insert)).await, 0);
        assert_eq!(transport.opened_total(), 1);
    }

    #[tokio::test]
    async fn test_remote_close() {
        let transport = MemoryTransport::new();
        let handle = transport
            .open_channel(&ChannelSpec::default(), Arc::new(|_: RecipeChange| {}))
            .await
            .unwrap();
        assert!(transport.is_channel_open(&handle).await);

        assert!(transport.close_remote(&handle).await);
        assert!(!transport.is_channel_open(&handle).await);
        assert_eq!(transport.emit(change("recipes", ChangeKind::Insert)).await, 0);
        assert_eq!(transport.open_channel_count().await, 1);

        transport.remove_channel(&handle).await.unwrap();
        assert!(!transport.close_remote(&handle).await);
    }
}
