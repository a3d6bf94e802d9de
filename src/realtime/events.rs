//! Wire schema for the websocket gateway, both directions.
//!
//! Frames are `{"event": <name>, "data": <payload>}`. Every event name is a
//! closed variant here; payload documents are the same camelCase shapes the
//! REST endpoints serve.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chats::{ChatDoc, MessageDoc};
use crate::swaps::SwapRequestDoc;

/// Server-to-client events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// The appended message, to the chat's room.
    #[serde(rename = "chat:message")]
    ChatMessage(MessageDoc),

    /// Full updated chat, to each participant's personal room.
    #[serde(rename = "chat:update")]
    ChatUpdate(ChatDoc),

    /// Chat purged, to each former participant's personal room; also relayed
    /// to the chat room on a partial delete (client-triggered peer notify).
    #[serde(rename = "chat:deleted")]
    #[serde(rename_all = "camelCase")]
    ChatDeleted { chat_id: Uuid },

    /// Chat created for an accepted swap, to both parties' personal rooms.
    #[serde(rename = "chat:start")]
    #[serde(rename_all = "camelCase")]
    ChatStart { chat_id: Uuid },

    #[serde(rename = "swapRequest:create")]
    SwapRequestCreate(SwapRequestDoc),

    #[serde(rename = "swapRequest:update")]
    SwapRequestUpdate(SwapRequestDoc),

    /// To the deleting user's own personal room only.
    #[serde(rename = "swapRequest:delete")]
    #[serde(rename_all = "camelCase")]
    SwapRequestDelete { request_id: Uuid },

    /// Synchronous rejection of an inbound signal.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Client-to-server signals.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientSignal {
    /// Join the caller's own personal room.
    #[serde(rename = "join")]
    Join(String),

    #[serde(rename = "join-chat")]
    JoinChat(Uuid),

    #[serde(rename = "leave-chat")]
    LeaveChat(Uuid),

    #[serde(rename = "chat:message")]
    ChatMessage(SendMessage),

    /// Peer notification after a REST chat delete.
    #[serde(rename = "delete-chat")]
    DeleteChat(Uuid),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub chat_id: Uuid,
    pub content: String,
    pub sender_id: String,
}
