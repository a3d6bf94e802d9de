mod chat;
mod delete;
mod list;
mod msg;

use axum::{routing::{get, post}, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{AppError, AppResult, AppState};

pub use delete::delete_for_user;
pub use msg::append_message;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::chats))
        .route("/message", post(msg::post_message))
        .route("/{uuid}", get(chat::chat).delete(delete::delete_chat))
}

/// Full chat document as served over REST and published as `chat:update`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDoc {
    pub id: Uuid,
    pub participants: Vec<Participant>,
    pub messages: Vec<MessageDoc>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub deleted_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub fullname: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDoc {
    pub id: Uuid,
    pub sender: String,
    pub sender_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

pub(crate) async fn chat_exists(db_pool: &SqlitePool, chat_id: Uuid) -> AppResult<bool> {
    Ok(sqlx::query_as::<_, (i64,)>("SELECT 1 FROM chats WHERE uuid=?")
        .bind(chat_id.to_string())
        .fetch_optional(db_pool)
        .await?
        .is_some())
}

pub(crate) async fn is_participant(db_pool: &SqlitePool, chat_id: Uuid, user_id: &str) -> AppResult<bool> {
    Ok(sqlx::query_as::<_, (i64,)>("SELECT 1 FROM chat_participants WHERE chat_id=? AND user_id=?")
        .bind(chat_id.to_string())
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?
        .is_some())
}

/// Load and populate a single chat. `ChatNotFound` once purged.
pub async fn load_chat(db_pool: &SqlitePool, chat_id: Uuid) -> AppResult<ChatDoc> {
    let Some((created_at, last_updated)): Option<(DateTime<Utc>, DateTime<Utc>)> =
        sqlx::query_as("SELECT created_at,last_updated FROM chats WHERE uuid=?")
            .bind(chat_id.to_string())
            .fetch_optional(db_pool)
            .await?
    else {
        return Err(AppError::ChatNotFound);
    };

    let participants = sqlx::query_as::<_, (String, String)>(
        "SELECT p.user_id,u.fullname FROM chat_participants p
         JOIN users u ON u.id = p.user_id WHERE p.chat_id=? ORDER BY p.user_id",
    )
    .bind(chat_id.to_string())
    .fetch_all(db_pool)
    .await?
    .into_iter()
    .map(|(id, fullname)| Participant { id, fullname })
    .collect();

    let rows: Vec<(String, String, String, String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT m.id,m.sender_id,u.fullname,m.content,m.sent_at FROM chat_messages m
         JOIN users u ON u.id = m.sender_id WHERE m.chat_id=? ORDER BY m.id",
    )
    .bind(chat_id.to_string())
    .fetch_all(db_pool)
    .await?;

    let mut messages = Vec::with_capacity(rows.len());
    for (id, sender, sender_name, content, timestamp) in rows {
        messages.push(MessageDoc {
            id: Uuid::parse_str(&id)?,
            sender,
            sender_name,
            content,
            timestamp,
        });
    }

    let deleted_by = sqlx::query_as::<_, (String,)>(
        "SELECT user_id FROM chat_deletions WHERE chat_id=? ORDER BY user_id",
    )
    .bind(chat_id.to_string())
    .fetch_all(db_pool)
    .await?
    .into_iter()
    .map(|(user_id,)| user_id)
    .collect();

    Ok(ChatDoc {
        id: chat_id,
        participants,
        messages,
        created_at,
        last_updated,
        deleted_by,
    })
}

/// Create the chat for a freshly accepted swap request. Runs inside the
/// accept transaction so the status write and the chat are one unit.
pub(crate) async fn create_for_swap(
    conn: &mut SqliteConnection,
    sender_id: &str,
    receiver_id: &str,
) -> AppResult<Uuid> {
    let chat_id = Uuid::now_v7();
    let now = Utc::now();
    sqlx::query("INSERT INTO chats (uuid,created_at,last_updated) VALUES (?,?,?)")
        .bind(chat_id.to_string())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    for user_id in [sender_id, receiver_id] {
        sqlx::query("INSERT INTO chat_participants (chat_id,user_id) VALUES (?,?)")
            .bind(chat_id.to_string())
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(chat_id)
}

#[cfg(test)]
pub(crate) async fn create_direct(db_pool: &SqlitePool, a: &str, b: &str) -> Uuid {
    let mut tx = db_pool.begin().await.unwrap();
    let chat_id = create_for_swap(&mut tx, a, b).await.unwrap();
    tx.commit().await.unwrap();
    chat_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn load_populates_names_and_participants() {
        let pool = db::test_pool().await;
        db::seed_user(&pool, "u1", "Alice Example").await;
        db::seed_user(&pool, "u2", "Bob Example").await;
        let chat_id = create_direct(&pool, "u1", "u2").await;

        let chat = load_chat(&pool, chat_id).await.unwrap();
        assert_eq!(chat.id, chat_id);
        assert_eq!(chat.participants.len(), 2);
        assert!(chat.participants.iter().any(|p| p.fullname == "Alice Example"));
        assert!(chat.messages.is_empty());
        assert!(chat.deleted_by.is_empty());
    }

    #[tokio::test]
    async fn missing_chat_is_not_found() {
        let pool = db::test_pool().await;
        let err = load_chat(&pool, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, AppError::ChatNotFound));
    }
}
