//! Folds change-feed events into the collection stores.
//!
//! The feed is the backend's word on what happened; the stores are the
//! client's mirror. Folding is defensive: duplicate inserts collapse,
//! updates to unknown rows are dropped (and counted), deletes of unknown
//! rows are no-ops.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use uuid::Uuid;

use cove_types::events::FeedEvent;
use cove_types::models::{ChatRow, Message, Profile, Reply};

use crate::store::Store;

/// Events the fold could not fully apply. A miss here means a row is
/// displayed without its sender, or an update went nowhere.
#[derive(Debug, Default)]
pub struct DropStats {
    enrichment_misses: AtomicU64,
    unmatched_updates: AtomicU64,
}

impl DropStats {
    pub fn enrichment_misses(&self) -> u64 {
        self.enrichment_misses.load(Ordering::Relaxed)
    }

    pub fn unmatched_updates(&self) -> u64 {
        self.unmatched_updates.load(Ordering::Relaxed)
    }

    fn count_enrichment_miss(&self) {
        self.enrichment_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn count_unmatched_update(&self) {
        self.unmatched_updates.fetch_add(1, Ordering::Relaxed);
    }
}

/// Applies feed events to the profile, message, and reply stores through
/// their `apply` entry points. One reconciler serves one subscription; the
/// session builds a fresh one on every scope change.
pub struct Reconciler {
    profiles: Store<Profile>,
    messages: Store<Message>,
    replies: Store<Reply>,
    stats: Arc<DropStats>,
}

impl Reconciler {
    pub fn new(
        profiles: Store<Profile>,
        messages: Store<Message>,
        replies: Store<Reply>,
        stats: Arc<DropStats>,
    ) -> Self {
        Self {
            profiles,
            messages,
            replies,
            stats,
        }
    }

    pub async fn fold(&self, event: FeedEvent) {
        match event {
            FeedEvent::ProfileInsert { row } => {
                self.profiles
                    .apply(|items| {
                        if !items.iter().any(|p| p.id == row.id) {
                            items.push(row);
                        }
                    })
                    .await;
            }
            FeedEvent::MessageInsert { row } => self.fold_insert(&self.messages, row).await,
            FeedEvent::MessageUpdate { row } => self.fold_update(&self.messages, row).await,
            FeedEvent::MessageDelete { id } => Self::fold_delete(&self.messages, id).await,
            FeedEvent::ReplyInsert { row } => self.fold_insert(&self.replies, row).await,
            FeedEvent::ReplyUpdate { row } => self.fold_update(&self.replies, row).await,
            FeedEvent::ReplyDelete { id } => Self::fold_delete(&self.replies, id).await,
        }
    }

    /// Enrich with the locally-known sender, then append unless the id is
    /// already present. Duplicate delivery is therefore idempotent.
    async fn fold_insert<T: ChatRow + Clone>(&self, store: &Store<T>, mut row: T) {
        let sender_id = row.sender_id();
        let sender = self
            .profiles
            .apply(|profiles| profiles.iter().find(|p| p.id == sender_id).cloned())
            .await;

        if sender.is_none() {
            // Profile hasn't arrived yet; the raw row goes in as-is.
            debug!("no local profile for sender {}", sender_id);
            self.stats.count_enrichment_miss();
        }
        row.set_sender(sender);

        store
            .apply(move |items| {
                if !items.iter().any(|existing| existing.id() == row.id()) {
                    items.push(row);
                }
            })
            .await;
    }

    /// Replace the stored row with the event's fields, keeping the old
    /// enrichment — the feed payload never carries it. Unknown ids are
    /// dropped.
    async fn fold_update<T: ChatRow + Clone>(&self, store: &Store<T>, row: T) {
        let matched = store
            .apply(move |items| {
                match items.iter_mut().find(|existing| existing.id() == row.id()) {
                    Some(existing) => {
                        let sender = existing.sender().cloned();
                        let mut fresh = row;
                        fresh.set_sender(sender);
                        *existing = fresh;
                        true
                    }
                    None => false,
                }
            })
            .await;

        if !matched {
            debug!("update for unknown row dropped");
            self.stats.count_unmatched_update();
        }
    }

    /// Absence is a no-op.
    async fn fold_delete<T: ChatRow>(store: &Store<T>, id: Uuid) {
        store
            .apply(|items| items.retain(|existing| existing.id() != id))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{message_row, profile};

    use super::*;

    fn reconciler() -> (Reconciler, Store<Message>, Store<Profile>, Arc<DropStats>) {
        let profiles = Store::new();
        let messages = Store::new();
        let replies = Store::new();
        let stats = Arc::new(DropStats::default());
        let reconciler = Reconciler::new(
            profiles.clone(),
            messages.clone(),
            replies,
            Arc::clone(&stats),
        );
        (reconciler, messages, profiles, stats)
    }

    #[tokio::test]
    async fn duplicate_insert_delivery_is_idempotent() {
        let (reconciler, messages, _, _) = reconciler();
        let row = message_row(Uuid::new_v4(), "hi");

        reconciler
            .fold(FeedEvent::MessageInsert { row: row.clone() })
            .await;
        reconciler.fold(FeedEvent::MessageInsert { row }).await;

        assert_eq!(messages.len().await, 1);
    }

    #[tokio::test]
    async fn insert_enriches_from_known_profiles() {
        let (reconciler, messages, profiles, stats) = reconciler();
        let sender = profile("Ada");
        profiles.complete(vec![sender.clone()]).await;

        let mut row = message_row(Uuid::new_v4(), "hi");
        row.sender_id = sender.id;
        reconciler.fold(FeedEvent::MessageInsert { row }).await;

        let stored = messages.items().await;
        assert_eq!(stored[0].sender.as_ref().unwrap().full_name, "Ada");
        assert_eq!(stats.enrichment_misses(), 0);
    }

    #[tokio::test]
    async fn insert_with_unknown_sender_keeps_the_raw_row_and_counts() {
        let (reconciler, messages, _, stats) = reconciler();

        let row = message_row(Uuid::new_v4(), "hi");
        reconciler.fold(FeedEvent::MessageInsert { row }).await;

        let stored = messages.items().await;
        assert_eq!(stored.len(), 1);
        assert!(stored[0].sender.is_none());
        assert_eq!(stats.enrichment_misses(), 1);
    }

    #[tokio::test]
    async fn update_preserves_enrichment_and_replaces_the_rest() {
        let (reconciler, messages, profiles, _) = reconciler();
        let sender = profile("Ada");
        profiles.complete(vec![sender.clone()]).await;

        let mut row = message_row(Uuid::new_v4(), "draft");
        row.sender_id = sender.id;
        reconciler
            .fold(FeedEvent::MessageInsert { row: row.clone() })
            .await;

        // The feed's update payload has no sender attached.
        let mut updated = row.clone();
        updated.text = "edited".into();
        updated.sender = None;
        reconciler.fold(FeedEvent::MessageUpdate { row: updated }).await;

        let stored = messages.items().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "edited");
        assert_eq!(stored[0].sender.as_ref().unwrap().full_name, "Ada");
    }

    #[tokio::test]
    async fn update_for_unknown_id_is_dropped_and_counted() {
        let (reconciler, messages, _, stats) = reconciler();

        let row = message_row(Uuid::new_v4(), "ghost");
        reconciler.fold(FeedEvent::MessageUpdate { row }).await;

        assert_eq!(messages.len().await, 0);
        assert_eq!(stats.unmatched_updates(), 1);
    }

    #[tokio::test]
    async fn delete_removes_the_row_and_repeats_are_no_ops() {
        let (reconciler, messages, _, _) = reconciler();
        let row = message_row(Uuid::new_v4(), "bye");
        let id = row.id;

        reconciler.fold(FeedEvent::MessageInsert { row }).await;
        assert_eq!(messages.len().await, 1);

        reconciler.fold(FeedEvent::MessageDelete { id }).await;
        reconciler.fold(FeedEvent::MessageDelete { id }).await;
        assert_eq!(messages.len().await, 0);
    }

    #[tokio::test]
    async fn delete_for_unknown_id_leaves_the_collection_alone() {
        let (reconciler, messages, _, _) = reconciler();
        let row = message_row(Uuid::new_v4(), "stay");
        let kept = row.id;
        reconciler.fold(FeedEvent::MessageInsert { row }).await;

        reconciler
            .fold(FeedEvent::MessageDelete { id: Uuid::new_v4() })
            .await;

        let stored = messages.items().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, kept);
    }

    #[tokio::test]
    async fn profile_insert_dedups_by_id() {
        let (reconciler, _, profiles, _) = reconciler();
        let row = profile("Ada");

        reconciler
            .fold(FeedEvent::ProfileInsert { row: row.clone() })
            .await;
        reconciler.fold(FeedEvent::ProfileInsert { row }).await;

        assert_eq!(profiles.len().await, 1);
    }
}
