//! Change-feed subscriptions.
//!
//! One websocket per subscription. Opening takes the current scope
//! identifiers as parameters and returns a disposable handle; changing scope
//! means dropping the old handle and opening a new one, so filters are
//! never captured implicitly.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};
use uuid::Uuid;

use cove_types::events::{FeedEvent, FeedRequest};

use crate::config::RemoteConfig;

/// Scope filters for one subscription. `None` leaves the corresponding
/// stream unfiltered; the profile insert stream is always unfiltered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedScope {
    pub channel: Option<Uuid>,
    pub thread: Option<Uuid>,
}

/// Opens change-feed subscriptions. The chat session goes through this seam
/// so tests can drive events without a network.
pub trait FeedOpener {
    fn open(&self, scope: FeedScope) -> FeedHandle;
}

/// A live subscription: an event receiver plus ownership of the task that
/// feeds it. Dropping the handle aborts the task and with it the connection.
pub struct FeedHandle {
    events: mpsc::UnboundedReceiver<FeedEvent>,
    task: Option<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn new(events: mpsc::UnboundedReceiver<FeedEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { events, task }
    }

    /// Next event; `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    pub fn close(self) {}
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Websocket connector for the hosted change feed.
pub struct RealtimeFeed {
    url: String,
    api_key: String,
    access_token: String,
}

impl RealtimeFeed {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            url: config.realtime_url.clone(),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
        }
    }
}

impl FeedOpener for RealtimeFeed {
    fn open(&self, scope: FeedScope) -> FeedHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let url = format!("{}?apikey={}&token={}", self.url, self.api_key, self.access_token);
        let task = tokio::spawn(run_subscription(url, scope, tx));
        FeedHandle::new(rx, Some(task))
    }
}

/// Connect, install the scope filters, then forward decoded events until the
/// stream ends. No retry or backoff: when the connection drops, the receiver
/// closes and the owner decides whether to resubscribe.
async fn run_subscription(url: String, scope: FeedScope, tx: mpsc::UnboundedSender<FeedEvent>) {
    let (stream, _) = match connect_async(&url).await {
        Ok(connected) => connected,
        Err(e) => {
            warn!("feed connect failed: {}", e);
            return;
        }
    };
    let (mut write, mut read) = stream.split();

    let subscribe = FeedRequest::Subscribe {
        channel_id: scope.channel,
        thread_id: scope.thread,
    };
    let frame = match serde_json::to_string(&subscribe) {
        Ok(json) => json,
        Err(e) => {
            warn!("feed subscribe encode failed: {}", e);
            return;
        }
    };
    if let Err(e) = write.send(WsMessage::Text(frame.into())).await {
        warn!("feed subscribe send failed: {}", e);
        return;
    }
    debug!(
        "feed subscribed: channel={:?} thread={:?}",
        scope.channel, scope.thread
    );

    while let Some(frame) = read.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<FeedEvent>(&text) {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break; // subscriber went away
                    }
                }
                Err(e) => debug!("ignoring unrecognized feed frame: {}", e),
            },
            Ok(WsMessage::Ping(payload)) => {
                let _ = write.send(WsMessage::Pong(payload)).await;
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("feed stream error: {}", e);
                break;
            }
        }
    }
}
