use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Row inserts --

/// Insert payload for the messages table. Attachments stay empty until the
/// blob upload has produced a real storage path.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub channel_id: Uuid,
    pub text: String,
    pub attachments: Vec<String>,
}

/// Insert payload for the replies table.
#[derive(Debug, Clone, Serialize)]
pub struct NewReply {
    pub message_id: Uuid,
    pub text: String,
    pub attachments: Vec<String>,
}

// -- Blob storage --

/// Response of a blob upload: the path the object was stored under.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredObject {
    pub path: String,
}

// -- Auth --

/// The authenticated user, as reported by the session endpoint. Token
/// refresh and persistence are out of scope; this is a point-in-time read.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    #[serde(rename = "id")]
    pub user_id: Uuid,
    pub email: Option<String>,
}
