//! In-process doubles for the gateway and the feed, plus row fixtures.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use cove_types::api::{NewMessage, NewReply};
use cove_types::events::FeedEvent;
use cove_types::models::{Channel, Message, Profile, Reply};

use cove_remote::error::{Error, Result};
use cove_remote::feed::{FeedHandle, FeedOpener, FeedScope};
use cove_remote::gateway::Gateway;

// -- Fixtures --

pub fn profile(name: &str) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        full_name: name.into(),
        avatar: None,
    }
}

pub fn channel(name: &str) -> Channel {
    Channel {
        id: Uuid::new_v4(),
        name: name.into(),
        description: None,
        created_at: Utc::now(),
    }
}

pub fn message_row(channel_id: Uuid, text: &str) -> Message {
    Message {
        id: Uuid::new_v4(),
        channel_id,
        sender_id: Uuid::new_v4(),
        text: text.into(),
        attachments: Vec::new(),
        created_at: Utc::now(),
        sender: None,
    }
}

// -- Gateway double --

/// Which gateway steps reject. Each failing call returns a backend error
/// without touching state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub insert: bool,
    pub upload: bool,
    pub patch: bool,
}

#[derive(Debug, Default)]
pub struct MemoryState {
    pub messages: Vec<Message>,
    pub replies: Vec<Reply>,
    pub profiles: Vec<Profile>,
    pub channels: Vec<Channel>,
    /// Stored blob paths
    pub objects: Vec<String>,
    pub inserts: usize,
    pub uploads: usize,
    pub patches: usize,
    pub removes: usize,
}

/// Backend stand-in: rows and blobs in vectors, call counters, optional
/// per-step failure injection.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    pub state: Mutex<MemoryState>,
    fail: Failures,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(fail: Failures) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            fail,
        }
    }

    fn rejected() -> Error {
        Error::Backend {
            status: 500,
            body: "injected failure".into(),
        }
    }

    /// The related-row expansion a real read performs.
    fn enrich<R: cove_types::models::ChatRow>(state: &MemoryState, mut row: R) -> R {
        let sender = state.profiles.iter().find(|p| p.id == row.sender_id()).cloned();
        row.set_sender(sender);
        row
    }
}

impl Gateway for MemoryGateway {
    async fn insert_message(&self, new: NewMessage) -> Result<Message> {
        if self.fail.insert {
            return Err(Self::rejected());
        }
        let mut state = self.state.lock().unwrap();
        state.inserts += 1;
        let message = Message {
            id: Uuid::new_v4(),
            channel_id: new.channel_id,
            sender_id: Uuid::nil(),
            text: new.text,
            attachments: new.attachments,
            created_at: Utc::now(),
            sender: None,
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn set_message_attachments(&self, id: Uuid, attachments: &[String]) -> Result<Message> {
        if self.fail.patch {
            return Err(Self::rejected());
        }
        let mut state = self.state.lock().unwrap();
        state.patches += 1;
        match state.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.attachments = attachments.to_vec();
                Ok(message.clone())
            }
            None => Err(Error::MissingRecord),
        }
    }

    async fn delete_message(&self, id: Uuid) -> Result<()> {
        self.state.lock().unwrap().messages.retain(|m| m.id != id);
        Ok(())
    }

    async fn list_messages(&self, channel_id: Uuid) -> Result<Vec<Message>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .map(|m| Self::enrich(&state, m))
            .collect())
    }

    async fn insert_reply(&self, new: NewReply) -> Result<Reply> {
        if self.fail.insert {
            return Err(Self::rejected());
        }
        let mut state = self.state.lock().unwrap();
        state.inserts += 1;
        let reply = Reply {
            id: Uuid::new_v4(),
            message_id: new.message_id,
            sender_id: Uuid::nil(),
            text: new.text,
            attachments: new.attachments,
            created_at: Utc::now(),
            sender: None,
        };
        state.replies.push(reply.clone());
        Ok(reply)
    }

    async fn set_reply_attachments(&self, id: Uuid, attachments: &[String]) -> Result<Reply> {
        if self.fail.patch {
            return Err(Self::rejected());
        }
        let mut state = self.state.lock().unwrap();
        state.patches += 1;
        match state.replies.iter_mut().find(|r| r.id == id) {
            Some(reply) => {
                reply.attachments = attachments.to_vec();
                Ok(reply.clone())
            }
            None => Err(Error::MissingRecord),
        }
    }

    async fn delete_reply(&self, id: Uuid) -> Result<()> {
        self.state.lock().unwrap().replies.retain(|r| r.id != id);
        Ok(())
    }

    async fn list_replies(&self, message_id: Uuid) -> Result<Vec<Reply>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .replies
            .iter()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .map(|r| Self::enrich(&state, r))
            .collect())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.state.lock().unwrap().profiles.clone())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        Ok(self.state.lock().unwrap().channels.clone())
    }

    async fn get_channel(&self, id: Uuid) -> Result<Channel> {
        self.state
            .lock()
            .unwrap()
            .channels
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(Error::MissingRecord)
    }

    async fn upload_object(&self, path: &str, _bytes: Bytes, _content_type: &str) -> Result<String> {
        if self.fail.upload {
            return Err(Self::rejected());
        }
        let mut state = self.state.lock().unwrap();
        state.uploads += 1;
        state.objects.push(path.to_string());
        Ok(path.to_string())
    }

    async fn remove_objects(&self, paths: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.removes += 1;
        state.objects.retain(|p| !paths.contains(p));
        Ok(())
    }
}

// -- Feed double --

/// Feed opener that records every requested scope and hands the test the
/// sending side of each subscription.
#[derive(Default)]
pub struct StubFeed {
    scopes: Arc<Mutex<Vec<FeedScope>>>,
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<FeedEvent>>>>,
}

impl StubFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scopes_handle(&self) -> Arc<Mutex<Vec<FeedScope>>> {
        Arc::clone(&self.scopes)
    }

    pub fn senders_handle(&self) -> Arc<Mutex<Vec<mpsc::UnboundedSender<FeedEvent>>>> {
        Arc::clone(&self.senders)
    }
}

impl FeedOpener for StubFeed {
    fn open(&self, scope: FeedScope) -> FeedHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scopes.lock().unwrap().push(scope);
        self.senders.lock().unwrap().push(tx);
        FeedHandle::new(rx, None)
    }
}
