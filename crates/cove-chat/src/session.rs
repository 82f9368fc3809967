//! The composed chat state: active scope identifiers, the four live
//! collections, and the feed subscription that keeps them current.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use cove_types::models::{Channel, Message, Profile, Reply};

use cove_remote::feed::{FeedOpener, FeedScope};
use cove_remote::gateway::Gateway;

use crate::reconciler::{DropStats, Reconciler};
use crate::store::Store;

/// One feed subscription plus the task folding its events. Dropping it
/// aborts the fold task, which in turn drops the feed handle and tears the
/// connection down.
struct Subscription {
    fold: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.fold.abort();
    }
}

/// Aggregates everything the UI layer reads: the directory stores, the
/// scoped message/reply stores, and the active channel/thread identifiers.
///
/// The gateway and feed opener are injected at construction. Scope changes
/// reload the affected store and re-establish the subscription: the old one
/// is disposed first, and the new one carries the current identifiers as
/// explicit filter parameters.
pub struct ChatSession<G, F> {
    gateway: G,
    feed: F,
    profiles: Store<Profile>,
    channels: Store<Channel>,
    messages: Store<Message>,
    replies: Store<Reply>,
    active_channel: Option<Uuid>,
    active_thread: Option<Uuid>,
    stats: Arc<DropStats>,
    subscription: Option<Subscription>,
}

impl<G: Gateway, F: FeedOpener> ChatSession<G, F> {
    pub fn new(gateway: G, feed: F) -> Self {
        Self {
            gateway,
            feed,
            profiles: Store::new(),
            channels: Store::new(),
            messages: Store::new(),
            replies: Store::new(),
            active_channel: None,
            active_thread: None,
            stats: Arc::new(DropStats::default()),
            subscription: None,
        }
    }

    /// Load the directory collections and open the initial (unfiltered)
    /// subscription, so profile inserts flow before any channel is picked.
    pub async fn bootstrap(&mut self) {
        self.profiles.begin().await;
        match self.gateway.list_profiles().await {
            Ok(rows) => self.profiles.complete(rows).await,
            Err(e) => {
                warn!("profile fetch failed: {}", e);
                self.profiles.fail().await;
            }
        }

        self.channels.begin().await;
        match self.gateway.list_channels().await {
            Ok(rows) => self.channels.complete(rows).await,
            Err(e) => {
                warn!("channel fetch failed: {}", e);
                self.channels.fail().await;
            }
        }

        self.resubscribe();
    }

    /// Switch the active channel: reload its messages and move the
    /// subscription's filter over. Setting the current value again is a
    /// no-op — the subscription only cycles when the identifier changes.
    /// `None` keeps the previous collection.
    pub async fn set_channel(&mut self, channel: Option<Uuid>) {
        if self.active_channel == channel {
            return;
        }
        self.active_channel = channel;
        self.reload_messages().await;
        self.resubscribe();
    }

    /// Switch the active thread, same contract as [`set_channel`].
    ///
    /// [`set_channel`]: ChatSession::set_channel
    pub async fn set_thread(&mut self, thread: Option<Uuid>) {
        if self.active_thread == thread {
            return;
        }
        self.active_thread = thread;
        self.reload_replies().await;
        self.resubscribe();
    }

    /// Track an externally driven navigation parameter. The route wins over
    /// whatever was set locally.
    pub async fn follow_route(&mut self, channel: Option<Uuid>) {
        self.set_channel(channel).await;
    }

    pub fn active_channel(&self) -> Option<Uuid> {
        self.active_channel
    }

    pub fn active_thread(&self) -> Option<Uuid> {
        self.active_thread
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn profiles(&self) -> &Store<Profile> {
        &self.profiles
    }

    pub fn channels(&self) -> &Store<Channel> {
        &self.channels
    }

    pub fn messages(&self) -> &Store<Message> {
        &self.messages
    }

    pub fn replies(&self) -> &Store<Reply> {
        &self.replies
    }

    pub fn drop_stats(&self) -> &DropStats {
        &self.stats
    }

    async fn reload_messages(&self) {
        // Absent scope: no fetch, the old collection stays visible.
        let Some(channel) = self.active_channel else {
            return;
        };
        self.messages.begin().await;
        match self.gateway.list_messages(channel).await {
            Ok(rows) => self.messages.complete(rows).await,
            Err(e) => {
                warn!("message fetch failed for channel {}: {}", channel, e);
                self.messages.fail().await;
            }
        }
    }

    async fn reload_replies(&self) {
        let Some(thread) = self.active_thread else {
            return;
        };
        self.replies.begin().await;
        match self.gateway.list_replies(thread).await {
            Ok(rows) => self.replies.complete(rows).await,
            Err(e) => {
                warn!("reply fetch failed for thread {}: {}", thread, e);
                self.replies.fail().await;
            }
        }
    }

    fn resubscribe(&mut self) {
        // The previous subscription goes down before the new one opens.
        self.subscription = None;

        let mut handle = self.feed.open(FeedScope {
            channel: self.active_channel,
            thread: self.active_thread,
        });
        let reconciler = Reconciler::new(
            self.profiles.clone(),
            self.messages.clone(),
            self.replies.clone(),
            Arc::clone(&self.stats),
        );
        let fold = tokio::spawn(async move {
            while let Some(event) = handle.recv().await {
                reconciler.fold(event).await;
            }
        });
        self.subscription = Some(Subscription { fold });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cove_types::events::FeedEvent;

    use crate::test_support::{MemoryGateway, StubFeed, channel, message_row, profile};

    use super::*;

    async fn eventually(mut check: impl AsyncFnMut() -> bool) {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn bootstrap_loads_directory_and_subscribes_unfiltered() {
        let gateway = MemoryGateway::new();
        gateway.state.lock().unwrap().profiles.push(profile("Ada"));
        let feed = StubFeed::new();
        let scopes = feed.scopes_handle();

        let mut session = ChatSession::new(gateway, feed);
        session.bootstrap().await;

        assert_eq!(session.profiles().len().await, 1);
        let opened = scopes.lock().unwrap().clone();
        assert_eq!(
            opened,
            vec![FeedScope {
                channel: None,
                thread: None
            }]
        );
    }

    #[tokio::test]
    async fn set_channel_reloads_messages_and_refilters_the_feed() {
        let gateway = MemoryGateway::new();
        let channel = Uuid::new_v4();
        gateway
            .state
            .lock()
            .unwrap()
            .messages
            .push(message_row(channel, "already there"));
        let feed = StubFeed::new();
        let scopes = feed.scopes_handle();

        let mut session = ChatSession::new(gateway, feed);
        session.bootstrap().await;
        session.set_channel(Some(channel)).await;

        assert_eq!(session.messages().len().await, 1);
        let opened = scopes.lock().unwrap().clone();
        assert_eq!(opened.len(), 2);
        assert_eq!(opened[1].channel, Some(channel));
    }

    #[tokio::test]
    async fn feed_events_reach_the_stores() {
        let gateway = MemoryGateway::new();
        let channel = Uuid::new_v4();
        let feed = StubFeed::new();
        let senders = feed.senders_handle();

        let mut session = ChatSession::new(gateway, feed);
        session.bootstrap().await;
        session.set_channel(Some(channel)).await;

        let tx = senders.lock().unwrap().last().unwrap().clone();
        tx.send(FeedEvent::MessageInsert {
            row: message_row(channel, "pushed"),
        })
        .unwrap();

        let messages = session.messages().clone();
        eventually(async || messages.len().await == 1).await;
    }

    #[tokio::test]
    async fn scope_change_disposes_the_previous_subscription() {
        let gateway = MemoryGateway::new();
        let feed = StubFeed::new();
        let senders = feed.senders_handle();

        let mut session = ChatSession::new(gateway, feed);
        session.bootstrap().await;
        let first = senders.lock().unwrap().last().unwrap().clone();

        session.set_channel(Some(Uuid::new_v4())).await;

        // The old handle is dropped with its fold task; its sender closes.
        eventually(async || first.is_closed()).await;
    }

    #[tokio::test]
    async fn route_overrides_a_locally_set_channel() {
        let gateway = MemoryGateway::new();
        let feed = StubFeed::new();
        let scopes = feed.scopes_handle();

        let mut session = ChatSession::new(gateway, feed);
        session.bootstrap().await;

        let local = Uuid::new_v4();
        session.set_channel(Some(local)).await;
        assert_eq!(session.active_channel(), Some(local));

        let routed = Uuid::new_v4();
        session.follow_route(Some(routed)).await;
        assert_eq!(session.active_channel(), Some(routed));

        // Same route again: no change, no extra subscription churn.
        let before = scopes.lock().unwrap().len();
        session.follow_route(Some(routed)).await;
        assert_eq!(scopes.lock().unwrap().len(), before);
    }

    #[tokio::test]
    async fn setting_the_same_channel_twice_does_not_churn_the_subscription() {
        let gateway = MemoryGateway::new();
        let target = Uuid::new_v4();
        let feed = StubFeed::new();
        let scopes = feed.scopes_handle();

        let mut session = ChatSession::new(gateway, feed);
        session.bootstrap().await;
        session.set_channel(Some(target)).await;
        assert_eq!(scopes.lock().unwrap().len(), 2);

        session.set_channel(Some(target)).await;
        assert_eq!(scopes.lock().unwrap().len(), 2);

        session.set_thread(None).await;
        assert_eq!(scopes.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn enrichment_misses_show_up_in_drop_stats() {
        let gateway = MemoryGateway::new();
        let target = Uuid::new_v4();
        let feed = StubFeed::new();
        let senders = feed.senders_handle();

        let mut session = ChatSession::new(gateway, feed);
        session.bootstrap().await;
        session.set_channel(Some(target)).await;

        // No profile for this sender is known locally.
        let tx = senders.lock().unwrap().last().unwrap().clone();
        tx.send(FeedEvent::MessageInsert {
            row: message_row(target, "unenriched"),
        })
        .unwrap();

        let messages = session.messages().clone();
        eventually(async || messages.len().await == 1).await;

        assert_eq!(session.drop_stats().enrichment_misses(), 1);
        assert_eq!(session.drop_stats().unmatched_updates(), 0);
    }

    #[tokio::test]
    async fn channel_lookup_goes_through_the_gateway() {
        let gateway = MemoryGateway::new();
        let general = channel("general");
        let id = general.id;
        gateway.state.lock().unwrap().channels.push(general);

        let session = ChatSession::new(gateway, StubFeed::new());

        let found = session.gateway().get_channel(id).await.unwrap();
        assert_eq!(found.name, "general");
        assert!(session.gateway().get_channel(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn absent_scope_retains_the_stale_collection() {
        let gateway = MemoryGateway::new();
        let channel = Uuid::new_v4();
        gateway
            .state
            .lock()
            .unwrap()
            .messages
            .push(message_row(channel, "kept"));
        let feed = StubFeed::new();

        let mut session = ChatSession::new(gateway, feed);
        session.bootstrap().await;
        session.set_channel(Some(channel)).await;
        assert_eq!(session.messages().len().await, 1);

        session.set_channel(None).await;
        assert_eq!(session.messages().len().await, 1);
        assert_eq!(session.active_channel(), None);
    }
}
