//! Recipe data access facade
//!
//! One object holding the REST client, the optional realtime transport and
//! at most one live change subscription. Construct it once and share it
//! (`Arc<RecipeFacade>`).

use errors::RecipeResult;
use recipe_model::{FetchOutcome, RecipeChange};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::realtime::{ChannelHandle, ChannelSpec, PhoenixTransport, RealtimeTransport};
use crate::rest::RecipeRestClient;

/// Result of `subscribe`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed(ChannelHandle),
    /// No realtime transport is configured; nothing was registered
    Unavailable,
}

impl SubscribeOutcome {
    pub fn handle(&self) -> Option<&ChannelHandle> {
        match self {
            Self::Subscribed(handle) => Some(handle),
            Self::Unavailable => None,
        }
    }
}

pub struct RecipeFacade {
    rest: RecipeRestClient,
    realtime: Option<Arc<dyn RealtimeTransport>>,
    channel: ChannelSpec,
    // Held across the whole of subscribe/unsubscribe so they serialize
    subscription: Mutex<Option<ChannelHandle>>,
}

impl RecipeFacade {
    /// `realtime: None` means change notifications are unavailable
    pub fn new(rest: RecipeRestClient, realtime: Option<Arc<dyn RealtimeTransport>>) -> Self {
        Self {
            rest,
            realtime,
            channel: ChannelSpec::default(),
            subscription: Mutex::new(None),
        }
    }

    pub fn with_channel(mut self, channel: ChannelSpec) -> Self {
        self.channel = channel;
        self
    }

    /// REST client plus, when enabled, the WebSocket transport
    pub fn from_config(config: &LinkConfig) -> RecipeResult<Self> {
        config.validate()?;
        let rest = RecipeRestClient::new(config)?;

        let realtime: Option<Arc<dyn RealtimeTransport>> = if config.realtime.enabled {
            Some(Arc::new(PhoenixTransport::new(config)?))
        } else {
            info!("Realtime disabled by configuration");
            None
        };

        Ok(Self::new(rest, realtime).with_channel(ChannelSpec::from_config(config)))
    }

    pub fn rest(&self) -> &RecipeRestClient {
        &self.rest
    }

    pub fn realtime_available(&self) -> bool {
        self.realtime.is_some()
    }

    /// Every recipe, newest first, or the backend's error text
    pub async fn fetch_all(&self) -> RecipeResult<FetchOutcome> {
        self.rest.fetch_all().await
    }

    /// Listen for all changes of the recipes table
    ///
    /// An existing subscription is torn down before the new channel opens, so
    /// the facade never holds more than one.
    pub async fn subscribe<F>(&self, callback: F) -> RecipeResult<SubscribeOutcome>
    where
        F: Fn(RecipeChange) + Send + Sync + 'static,
    {
        let Some(transport) = &self.realtime else {
            warn!("Realtime client unavailable, subscription skipped");
            return Ok(SubscribeOutcome::Unavailable);
        };

        let mut current = self.subscription.lock().await;
        if let Some(existing) = current.take() {
            info!("Replacing subscription {}", existing);
            if let Err(e) = transport.remove_channel(&existing).await {
                *current = Some(existing);
                return Err(e);
            }
        }

        let handle = transport
            .open_channel(&self.channel, Arc::new(callback))
            .await?;
        info!("Subscribed to {}", handle);
        *current = Some(handle.clone());

        Ok(SubscribeOutcome::Subscribed(handle))
    }

    /// Drop the current subscription; a no-op when there is none
    pub async fn unsubscribe(&self) -> RecipeResult<()> {
        let mut current = self.subscription.lock().await;
        let Some(handle) = current.take() else {
            debug!("No active subscription");
            return Ok(());
        };

        if let Some(transport) = &self.realtime {
            if let Err(e) = transport.remove_channel(&handle).await {
                *current = Some(handle);
                return Err(e);
            }
        }
        info!("Unsubscribed from {}", handle);
        Ok(())
    }

    /// False once the server or the connection ended the channel
    pub async fn is_subscribed(&self) -> bool {
        self.live_handle().await.is_some()
    }

    pub async fn current_handle(&self) -> Option<ChannelHandle> {
        self.live_handle().await
    }

    /// Held handle, released first if its channel no longer delivers
    async fn live_handle(&self) -> Option<ChannelHandle> {
        let mut current = self.subscription.lock().await;
        let transport = self.realtime.as_ref()?;
        let handle = current.as_ref()?;
        if transport.is_channel_open(handle).await {
            return Some(handle.clone());
        }

        warn!("Channel {} was closed by the server", handle);
        let handle = current.take()?;
        if let Err(e) = transport.remove_channel(&handle).await {
            warn!("Cleanup of {} failed: {}", handle, e);
        }
        None
    }
}
