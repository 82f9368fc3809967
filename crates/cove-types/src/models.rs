use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A member profile. Read-only from the client's perspective: rows appear
/// via the initial fetch and via profile insert events on the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A message in a channel.
///
/// `sender` is display enrichment joined from the profiles table. It never
/// travels back to the backend and change-feed payloads do not carry it,
/// which is why it skips serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, rename = "profiles", skip_serializing)]
    pub sender: Option<Profile>,
}

/// A threaded reply. Same shape as [`Message`], scoped to a parent message
/// instead of a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub id: Uuid,
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, rename = "profiles", skip_serializing)]
    pub sender: Option<Profile>,
}

/// Common surface of the two feed-reconciled row kinds, so collection
/// folding is written once for both.
pub trait ChatRow {
    fn id(&self) -> Uuid;
    fn sender_id(&self) -> Uuid;
    fn sender(&self) -> Option<&Profile>;
    fn set_sender(&mut self, sender: Option<Profile>);
}

impl ChatRow for Message {
    fn id(&self) -> Uuid {
        self.id
    }

    fn sender_id(&self) -> Uuid {
        self.sender_id
    }

    fn sender(&self) -> Option<&Profile> {
        self.sender.as_ref()
    }

    fn set_sender(&mut self, sender: Option<Profile>) {
        self.sender = sender;
    }
}

impl ChatRow for Reply {
    fn id(&self) -> Uuid {
        self.id
    }

    fn sender_id(&self) -> Uuid {
        self.sender_id
    }

    fn sender(&self) -> Option<&Profile> {
        self.sender.as_ref()
    }

    fn set_sender(&mut self, sender: Option<Profile>) {
        self.sender = sender;
    }
}
