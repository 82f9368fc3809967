use bytes::Bytes;
use uuid::Uuid;

use cove_types::api::{NewMessage, NewReply};
use cove_types::models::{Channel, Message, Profile, Reply};

use crate::error::Result;

/// The backend surface the chat layer depends on: per-table CRUD with
/// related-row expansion, plus path-addressed blob storage.
///
/// [`RemoteClient`] is the HTTP implementation; tests substitute an
/// in-memory one. Implementations are expected to be cheap to call from a
/// single task; nothing here is spawned.
///
/// [`RemoteClient`]: crate::client::RemoteClient
#[allow(async_fn_in_trait)]
pub trait Gateway {
    // -- Messages --

    /// Insert a message row and return the confirmed record.
    async fn insert_message(&self, new: NewMessage) -> Result<Message>;

    /// Replace a message's attachment paths and return the patched record.
    async fn set_message_attachments(&self, id: Uuid, attachments: &[String]) -> Result<Message>;

    async fn delete_message(&self, id: Uuid) -> Result<()>;

    /// All messages in a channel, sender profile joined on.
    async fn list_messages(&self, channel_id: Uuid) -> Result<Vec<Message>>;

    // -- Replies --

    async fn insert_reply(&self, new: NewReply) -> Result<Reply>;

    async fn set_reply_attachments(&self, id: Uuid, attachments: &[String]) -> Result<Reply>;

    async fn delete_reply(&self, id: Uuid) -> Result<()>;

    /// All replies under a parent message, sender profile joined on.
    async fn list_replies(&self, message_id: Uuid) -> Result<Vec<Reply>>;

    // -- Directory --

    async fn list_profiles(&self) -> Result<Vec<Profile>>;

    async fn list_channels(&self) -> Result<Vec<Channel>>;

    async fn get_channel(&self, id: Uuid) -> Result<Channel>;

    // -- Blob storage --

    /// Store raw bytes under `path` in the bucket; returns the stored path.
    async fn upload_object(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String>;

    /// Batch-delete objects by path. Unknown paths are ignored by the
    /// backend.
    async fn remove_objects(&self, paths: &[String]) -> Result<()>;
}
