use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Profile, Reply};

/// Row-change events pushed over the realtime feed.
///
/// One variant per (table, kind) stream the client subscribes to. Delete
/// events carry only the row identifier; the backend does not replay the
/// deleted row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedEvent {
    /// A new member profile appeared
    ProfileInsert { row: Profile },

    /// A message was posted in the subscribed channel
    MessageInsert { row: Message },

    /// A message in the subscribed channel changed
    MessageUpdate { row: Message },

    /// A message was removed
    MessageDelete { id: Uuid },

    /// A reply was posted in the subscribed thread
    ReplyInsert { row: Reply },

    /// A reply in the subscribed thread changed
    ReplyUpdate { row: Reply },

    /// A reply was removed
    ReplyDelete { id: Uuid },
}

/// Commands sent FROM client TO the feed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedRequest {
    /// Establish the server-side filters for this connection. `None` means
    /// the corresponding stream is unfiltered.
    Subscribe {
        channel_id: Option<Uuid>,
        thread_id: Option<Uuid>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_event_decodes() {
        let json = r#"{
            "type": "MessageInsert",
            "data": {
                "row": {
                    "id": "3fa9b1c0-0000-0000-0000-000000000001",
                    "channel_id": "3fa9b1c0-0000-0000-0000-000000000002",
                    "sender_id": "3fa9b1c0-0000-0000-0000-000000000003",
                    "text": "hello",
                    "attachments": [],
                    "created_at": "2026-01-04T10:00:00Z"
                }
            }
        }"#;

        match serde_json::from_str::<FeedEvent>(json).unwrap() {
            FeedEvent::MessageInsert { row } => {
                assert_eq!(row.text, "hello");
                assert!(row.sender.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn delete_event_carries_only_the_id() {
        let json = r#"{"type":"ReplyDelete","data":{"id":"3fa9b1c0-0000-0000-0000-000000000009"}}"#;
        match serde_json::from_str::<FeedEvent>(json).unwrap() {
            FeedEvent::ReplyDelete { id } => {
                assert_eq!(id.to_string(), "3fa9b1c0-0000-0000-0000-000000000009");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn subscribe_request_round_trips_scope_filters() {
        let request = FeedRequest::Subscribe {
            channel_id: Some(Uuid::new_v4()),
            thread_id: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"Subscribe\""));
        assert!(json.contains("\"thread_id\":null"));
    }
}
