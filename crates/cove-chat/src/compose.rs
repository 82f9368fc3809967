//! Message and reply creation.
//!
//! Creating a record with an attachment is three dependent backend calls:
//! insert the row, upload the blob, patch the row with the blob path. There
//! is no transaction spanning them, so the failure branches compensate by
//! hand — whatever was already created gets deleted before the error is
//! returned. The invariant: no row ever outlives the workflow with a
//! half-done attachment.

use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use cove_types::api::{NewMessage, NewReply};
use cove_types::models::{Message, Reply};

use cove_remote::error::{Error, Result};
use cove_remote::gateway::Gateway;

/// Blob folder for channel content. Replies share it, keyed by their
/// channel's id.
const CHANNEL_FOLDER: &str = "channel";

/// An attachment as handed over by the caller.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub name: String,
    pub bytes: Bytes,
    pub content_type: String,
}

/// What the user typed: text, an optional file, or both.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub text: String,
    pub file: Option<FilePayload>,
}

impl Draft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            file: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty() && self.file.is_none()
    }
}

/// Post a message to a channel.
///
/// Returns `Ok(None)` for an empty draft (nothing to send), otherwise the
/// server-confirmed record with its final attachment paths.
pub async fn send_message<G: Gateway>(
    gateway: &G,
    channel_id: Uuid,
    draft: Draft,
) -> Result<Option<Message>> {
    if draft.is_empty() {
        return Ok(None);
    }

    // Fail on an unusable file name before anything is created.
    let extension = match &draft.file {
        Some(file) => Some(file_extension(&file.name)?.to_string()),
        None => None,
    };

    let message = gateway
        .insert_message(NewMessage {
            channel_id,
            text: draft.text,
            attachments: Vec::new(),
        })
        .await?;

    let (Some(file), Some(extension)) = (draft.file, extension) else {
        return Ok(Some(message));
    };

    let path = object_path(CHANNEL_FOLDER, channel_id, message.id, &extension);
    let stored = match gateway.upload_object(&path, file.bytes, &file.content_type).await {
        Ok(stored) => stored,
        Err(upload_error) => {
            if let Err(e) = gateway.delete_message(message.id).await {
                warn!("rollback: message {} not deleted: {}", message.id, e);
            }
            return Err(upload_error);
        }
    };

    match gateway.set_message_attachments(message.id, &[stored.clone()]).await {
        Ok(patched) => Ok(Some(patched)),
        Err(patch_error) => {
            if let Err(e) = gateway.remove_objects(&[stored]).await {
                warn!("rollback: uploaded blob not removed: {}", e);
            }
            if let Err(e) = gateway.delete_message(message.id).await {
                warn!("rollback: message {} not deleted: {}", message.id, e);
            }
            Err(patch_error)
        }
    }
}

/// Post a reply under a parent message. The blob path is namespaced by the
/// channel, like message attachments, so the channel id comes along.
pub async fn send_reply<G: Gateway>(
    gateway: &G,
    message_id: Uuid,
    channel_id: Uuid,
    draft: Draft,
) -> Result<Option<Reply>> {
    if draft.is_empty() {
        return Ok(None);
    }

    let extension = match &draft.file {
        Some(file) => Some(file_extension(&file.name)?.to_string()),
        None => None,
    };

    let reply = gateway
        .insert_reply(NewReply {
            message_id,
            text: draft.text,
            attachments: Vec::new(),
        })
        .await?;

    let (Some(file), Some(extension)) = (draft.file, extension) else {
        return Ok(Some(reply));
    };

    let path = object_path(CHANNEL_FOLDER, channel_id, reply.id, &extension);
    let stored = match gateway.upload_object(&path, file.bytes, &file.content_type).await {
        Ok(stored) => stored,
        Err(upload_error) => {
            if let Err(e) = gateway.delete_reply(reply.id).await {
                warn!("rollback: reply {} not deleted: {}", reply.id, e);
            }
            return Err(upload_error);
        }
    };

    match gateway.set_reply_attachments(reply.id, &[stored.clone()]).await {
        Ok(patched) => Ok(Some(patched)),
        Err(patch_error) => {
            if let Err(e) = gateway.remove_objects(&[stored]).await {
                warn!("rollback: uploaded blob not removed: {}", e);
            }
            if let Err(e) = gateway.delete_reply(reply.id).await {
                warn!("rollback: reply {} not deleted: {}", reply.id, e);
            }
            Err(patch_error)
        }
    }
}

/// `{folder}/{scope}/{entity}.{extension}`
fn object_path(folder: &str, scope: Uuid, entity: Uuid, extension: &str) -> String {
    format!("{folder}/{scope}/{entity}.{extension}")
}

/// The part after the last dot. A name without one cannot be stored.
fn file_extension(name: &str) -> Result<&str> {
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => Ok(extension),
        _ => Err(Error::InvalidExtension(name.to_string())),
    }
}
