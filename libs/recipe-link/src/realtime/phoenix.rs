//! Realtime transport over the backend's Phoenix channel socket
//!
//! Every channel gets its own WebSocket. After the `phx_join` is acknowledged
//! a background reader task owns the socket: it forwards `postgres_changes`
//! to the callback, sends the periodic heartbeat and, when asked to close,
//! sends `phx_leave` before closing the socket.

use async_trait::async_trait;
use errors::{protocol_error, RecipeError, RecipeResult};
use futures_util::{SinkExt, StreamExt};
use recipe_model::RecipeChange;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use url::Url;

use super::{ChangeCallback, ChannelHandle, ChannelSpec, RealtimeTransport};
use crate::config::LinkConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SOCKET_PATH: &str = "/realtime/v1/websocket";
const PROTOCOL_VSN: &str = "1.0.0";
const JOIN_REF: &str = "1";
/// Upper bound on waiting for the reader task to say goodbye
const LEAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// One frame of the channel protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join_ref: Option<String>,
}

impl PhoenixMessage {
    fn to_frame(&self) -> RecipeResult<Message> {
        Ok(Message::Text(serde_json::to_string(self)?))
    }
}

/// Socket URL: http(s) scheme swapped for ws(s), key and protocol version in the query
fn socket_url(base_url: &str, api_key: &str) -> RecipeResult<Url> {
    let invalid = |reason: String| RecipeError::InvalidConfig {
        field: "backend_url".to_string(),
        reason,
    };

    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid("cannot switch to a WebSocket scheme".to_string()))?;
    url.set_path(SOCKET_PATH);
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", api_key)
        .append_pair("vsn", PROTOCOL_VSN);
    Ok(url)
}

struct ChannelTask {
    close_tx: Option<oneshot::Sender<()>>,
    reader: JoinHandle<()>,
}

pub struct PhoenixTransport {
    url: Url,
    api_key: String,
    heartbeat_interval: Duration,
    connect_timeout: Duration,
    next_id: AtomicU64,
    channels: Mutex<HashMap<u64, ChannelTask>>,
}

impl PhoenixTransport {
    pub fn new(config: &LinkConfig) -> RecipeResult<Self> {
        Ok(Self {
            url: socket_url(config.base_url(), &config.api_key)?,
            api_key: config.api_key.clone(),
            heartbeat_interval: config.realtime.heartbeat_interval(),
            connect_timeout: config.realtime.connect_timeout(),
            next_id: AtomicU64::new(1),
            channels: Mutex::new(HashMap::new()),
        })
    }

    /// Socket endpoint without the query (the key is never logged)
    pub fn endpoint(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.to_string()
    }

    async fn connect(&self) -> RecipeResult<WsStream> {
        let endpoint = self.endpoint();
        match timeout(self.connect_timeout, connect_async(self.url.as_str())).await {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(e)) => Err(RecipeError::ConnectionFailed {
                endpoint,
                reason: e.to_string(),
            }),
            Err(_) => Err(RecipeError::Timeout(endpoint)),
        }
    }

    async fn join(&self, ws: &mut WsStream, topic: &str, spec: &ChannelSpec) -> RecipeResult<()> {
        let join = PhoenixMessage {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "postgres_changes": [{
                        "event": spec.event.as_str(),
                        "schema": spec.schema,
                        "table": spec.table,
                    }]
                },
                "access_token": self.api_key,
            }),
            msg_ref: Some(JOIN_REF.to_string()),
            join_ref: Some(JOIN_REF.to_string()),
        };
        ws.send(join.to_frame()?).await?;

        match timeout(self.connect_timeout, wait_for_join_reply(ws, topic)).await {
            Ok(result) => result,
            Err(_) => Err(RecipeError::Timeout(format!("join of {}", topic))),
        }
    }
}

async fn wait_for_join_reply(ws: &mut WsStream, topic: &str) -> RecipeResult<()> {
    while let Some(frame) = ws.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let message: PhoenixMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                debug!("Ignoring undecodable frame while joining: {}", e);
                continue;
            },
        };
        if message.event != "phx_reply"
            || message.topic != topic
            || message.msg_ref.as_deref() != Some(JOIN_REF)
        {
            trace!("Ignoring {} on {} while joining", message.event, message.topic);
            continue;
        }

        return match message.payload.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(()),
            Some(status) => {
                let reason = message
                    .payload
                    .pointer("/response/reason")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("status {}", status));
                Err(RecipeError::JoinRejected {
                    channel: topic.to_string(),
                    reason,
                })
            },
            None => Err(protocol_error!(
                "phoenix",
                format!("join reply on {} carries no status", topic)
            )),
        };
    }

    Err(RecipeError::ChannelClosed(format!(
        "socket closed before {} was joined",
        topic
    )))
}

/// Send `phx_leave` and close; failures only matter for the log
async fn leave_and_close(ws: &mut WsStream, topic: &str, msg_ref: u64) {
    let leave = PhoenixMessage {
        topic: topic.to_string(),
        event: "phx_leave".to_string(),
        payload: json!({}),
        msg_ref: Some(msg_ref.to_string()),
        join_ref: Some(JOIN_REF.to_string()),
    };
    match leave.to_frame() {
        Ok(frame) => {
            if let Err(e) = ws.send(frame).await {
                debug!("Failed to send phx_leave on {}: {}", topic, e);
            }
        },
        Err(e) => debug!("Failed to encode phx_leave: {}", e),
    }
    if let Err(e) = ws.close(None).await {
        debug!("Failed to close socket of {}: {}", topic, e);
    }
}

fn handle_text(text: &str, topic: &str, spec: &ChannelSpec, callback: &ChangeCallback) -> bool {
    let message: PhoenixMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Undecodable realtime frame: {}", e);
            return true;
        },
    };

    match message.event.as_str() {
        "postgres_changes" if message.topic == topic => {
            let Some(data) = message.payload.get("data") else {
                warn!("postgres_changes without data on {}", topic);
                return true;
            };
            match serde_json::from_value::<RecipeChange>(data.clone()) {
                Ok(change) if spec.accepts(&change) => {
                    debug!("{} change on {}.{}", change.event_type, change.schema, change.table);
                    callback(change);
                },
                Ok(change) => {
                    trace!("Dropping change for {}.{}", change.schema, change.table);
                },
                Err(e) => warn!("Skipping undecodable change on {}: {}", topic, e),
            }
            true
        },
        "phx_close" if message.topic == topic => {
            info!("Channel {} closed by server", topic);
            false
        },
        "phx_error" if message.topic == topic => {
            warn!("Channel {} errored: {}", topic, message.payload);
            false
        },
        "phx_reply" => {
            if message.payload.get("status").and_then(Value::as_str) != Some("ok") {
                warn!("Negative reply on {}: {}", message.topic, message.payload);
            }
            true
        },
        other => {
            trace!("Ignoring {} on {}", other, message.topic);
            true
        },
    }
}

async fn ws_reader_loop(
    mut ws: WsStream,
    close_rx: oneshot::Receiver<()>,
    topic: String,
    spec: ChannelSpec,
    callback: ChangeCallback,
    heartbeat_every: Duration,
) {
    tokio::pin!(close_rx);

    let mut heartbeat = interval_at(Instant::now() + heartbeat_every, heartbeat_every);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            biased;

            // Explicit close, or the transport went away
            _ = &mut close_rx => {
                leave_and_close(&mut ws, &topic, next_ref).await;
                debug!("Reader of {} stopped", topic);
                return;
            }

            _ = heartbeat.tick() => {
                let beat = PhoenixMessage {
                    topic: "phoenix".to_string(),
                    event: "heartbeat".to_string(),
                    payload: json!({}),
                    msg_ref: Some(next_ref.to_string()),
                    join_ref: None,
                };
                next_ref += 1;
                let sent = match beat.to_frame() {
                    Ok(frame) => ws.send(frame).await.map_err(RecipeError::from),
                    Err(e) => Err(e),
                };
                if let Err(e) = sent {
                    warn!("Heartbeat on {} failed, channel lost: {}", topic, e);
                    return;
                }
                trace!("Heartbeat sent on {}", topic);
            }

            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    trace!("<- {}", text);
                    if !handle_text(&text, &topic, &spec, &callback) {
                        return;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    info!("Socket of {} closed by server: {:?}", topic, frame);
                    // Sends the queued close reply
                    if let Err(e) = ws.flush().await {
                        debug!("Close reply on {} not sent: {}", topic, e);
                    }
                    return;
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    warn!("Socket error on {}: {}", topic, e);
                    return;
                },
                None => {
                    info!("Socket of {} ended", topic);
                    return;
                },
            }
        }
    }
}

#[async_trait]
impl RealtimeTransport for PhoenixTransport {
    async fn open_channel(
        &self,
        spec: &ChannelSpec,
        callback: ChangeCallback,
    ) -> RecipeResult<ChannelHandle> {
        let topic = format!("realtime:{}", spec.name);
        let mut ws = self.connect().await?;

        if let Err(e) = self.join(&mut ws, &topic, spec).await {
            let _ = ws.close(None).await;
            return Err(e);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = ChannelHandle::new(id, spec.name.clone());
        let (close_tx, close_rx) = oneshot::channel();
        let reader = tokio::spawn(ws_reader_loop(
            ws,
            close_rx,
            topic,
            spec.clone(),
            callback,
            self.heartbeat_interval,
        ));

        self.channels.lock().await.insert(
            id,
            ChannelTask {
                close_tx: Some(close_tx),
                reader,
            },
        );
        info!("Joined channel {} on {}", handle, self.endpoint());
        Ok(handle)
    }

    async fn remove_channel(&self, handle: &ChannelHandle) -> RecipeResult<()> {
        let Some(mut task) = self.channels.lock().await.remove(&handle.id()) else {
            return Ok(());
        };

        if let Some(close_tx) = task.close_tx.take() {
            // Reader may already be gone, e.g. after a server-side close
            let _ = close_tx.send(());
        }
        if timeout(LEAVE_TIMEOUT, &mut task.reader).await.is_err() {
            warn!("Reader of {} did not stop in time, aborting", handle);
            task.reader.abort();
        }
        info!("Left channel {}", handle);
        Ok(())
    }

    async fn is_channel_open(&self, handle: &ChannelHandle) -> bool {
        self.channels
            .lock()
            .await
            .get(&handle.id())
            .is_some_and(|task| !task.reader.is_finished())
    }

    async fn open_channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}

impl Drop for PhoenixTransport {
    fn drop(&mut self) {
        for (_, mut task) in self.channels.get_mut().drain() {
            if let Some(close_tx) = task.close_tx.take() {
                let _ = close_tx.send(());
            }
        }
    }
}
