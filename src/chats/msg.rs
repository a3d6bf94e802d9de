use axum::{debug_handler, extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::realtime::{EventBus, Room, ServerEvent};
use crate::session::require_user;
use crate::{AppError, AppResult, AppState};

use super::{load_chat, ChatDoc};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostMessageBody {
    chat_id: Uuid,
    content: String,
}

/// REST append path; the websocket gateway relays into [`append_message`]
/// directly. Responds with the updated chat.
#[debug_handler(state = AppState)]
pub(crate) async fn post_message(
    State(db_pool): State<SqlitePool>,
    State(bus): State<EventBus>,
    session: Session,
    Json(PostMessageBody { chat_id, content }): Json<PostMessageBody>,
) -> AppResult<Json<ChatDoc>> {
    let user_id = require_user(&session).await?;
    let chat = append_message(&db_pool, &bus, chat_id, &user_id, &content).await?;
    Ok(Json(chat))
}

/// Append one message: persist (insert + clear deletion markers + bump
/// `last_updated`, one transaction), then publish. A new message un-deletes
/// the conversation for every participant. Nothing is published unless the
/// write committed.
pub async fn append_message(
    db_pool: &SqlitePool,
    bus: &EventBus,
    chat_id: Uuid,
    sender_id: &str,
    content: &str,
) -> AppResult<ChatDoc> {
    if content.trim().is_empty() {
        return Err(AppError::InvalidMessage);
    }

    let message_id = Uuid::now_v7();
    let now = Utc::now();

    let mut tx = db_pool.begin().await?;
    let touched = sqlx::query("UPDATE chats SET last_updated=? WHERE uuid=?")
        .bind(now)
        .bind(chat_id.to_string())
        .execute(&mut *tx)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(AppError::ChatNotFound);
    }
    sqlx::query("INSERT INTO chat_messages (id,chat_id,sender_id,content,sent_at) VALUES (?,?,?,?,?)")
        .bind(message_id.to_string())
        .bind(chat_id.to_string())
        .bind(sender_id)
        .bind(content)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chat_deletions WHERE chat_id=?")
        .bind(chat_id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let chat = load_chat(db_pool, chat_id).await?;
    let appended = chat
        .messages
        .iter()
        .find(|m| m.id == message_id)
        .cloned()
        .ok_or_else(|| AppError::msg("appended message missing after commit"))?;

    bus.publish(&Room::Chat(chat_id), ServerEvent::ChatMessage(appended)).await;
    for participant in &chat.participants {
        bus.publish(
            &Room::User(participant.id.clone()),
            ServerEvent::ChatUpdate(chat.clone()),
        )
        .await;
    }

    Ok(chat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chats::create_direct;
    use crate::db;

    async fn setup() -> (SqlitePool, EventBus, Uuid) {
        let pool = db::test_pool().await;
        db::seed_user(&pool, "u1", "Alice Example").await;
        db::seed_user(&pool, "u2", "Bob Example").await;
        let chat_id = create_direct(&pool, "u1", "u2").await;
        (pool, EventBus::new(), chat_id)
    }

    #[tokio::test]
    async fn append_publishes_to_chat_room_and_personal_rooms() {
        let (pool, bus, chat_id) = setup().await;

        let (viewer, mut viewer_rx) = bus.register().await;
        bus.join(viewer, Room::Chat(chat_id)).await;
        let (alice, mut alice_rx) = bus.register().await;
        bus.join(alice, Room::User("u1".to_owned())).await;
        let (bob, mut bob_rx) = bus.register().await;
        bus.join(bob, Room::User("u2".to_owned())).await;

        append_message(&pool, &bus, chat_id, "u1", "hello").await.unwrap();

        let Some(ServerEvent::ChatMessage(message)) = viewer_rx.recv().await else {
            panic!("expected chat:message in the chat room");
        };
        assert_eq!(message.sender, "u1");
        assert_eq!(message.content, "hello");

        for rx in [&mut alice_rx, &mut bob_rx] {
            let Some(ServerEvent::ChatUpdate(chat)) = rx.recv().await else {
                panic!("expected chat:update in the personal room");
            };
            assert_eq!(chat.id, chat_id);
            assert_eq!(chat.messages.len(), 1);
            assert_eq!(chat.messages[0].content, "hello");
        }
    }

    #[tokio::test]
    async fn empty_content_is_rejected_and_nothing_published() {
        let (pool, bus, chat_id) = setup().await;
        let (viewer, mut viewer_rx) = bus.register().await;
        bus.join(viewer, Room::Chat(chat_id)).await;

        for content in ["", "   ", "\n\t"] {
            let err = append_message(&pool, &bus, chat_id, "u1", content).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidMessage));
        }

        let chat = load_chat(&pool, chat_id).await.unwrap();
        assert!(chat.messages.is_empty());
        assert!(viewer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_chat_fails_without_publishing() {
        let (pool, bus, _) = setup().await;
        let err = append_message(&pool, &bus, Uuid::now_v7(), "u1", "hi").await.unwrap_err();
        assert!(matches!(err, AppError::ChatNotFound));
    }

    #[tokio::test]
    async fn append_clears_deletion_markers() {
        let (pool, bus, chat_id) = setup().await;
        sqlx::query("INSERT INTO chat_deletions (chat_id,user_id) VALUES (?,?)")
            .bind(chat_id.to_string())
            .bind("u1")
            .execute(&pool)
            .await
            .unwrap();

        let chat = append_message(&pool, &bus, chat_id, "u2", "you there?").await.unwrap();
        assert!(chat.deleted_by.is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_all_land_in_some_total_order() {
        let (pool, bus, chat_id) = setup().await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let pool = pool.clone();
            let bus = bus.clone();
            handles.push(tokio::spawn(async move {
                let sender = if i % 2 == 0 { "u1" } else { "u2" };
                append_message(&pool, &bus, chat_id, sender, &format!("msg-{i}")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let chat = load_chat(&pool, chat_id).await.unwrap();
        assert_eq!(chat.messages.len(), 8);
        let mut contents: Vec<_> = chat.messages.iter().map(|m| m.content.clone()).collect();
        contents.sort();
        contents.dedup();
        assert_eq!(contents.len(), 8);
    }
}
