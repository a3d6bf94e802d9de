use axum::{debug_handler, extract::State, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::session::require_user;
use crate::AppResult;

use super::load_chat;

/// Chats visible to the caller (participant, not self-deleted), most
/// recently updated first.
#[debug_handler]
pub(crate) async fn chats(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Value>> {
    let user_id = require_user(&session).await?;

    let ids = sqlx::query_as::<_, (String,)>(
        "SELECT c.uuid FROM chats c
         JOIN chat_participants p ON p.chat_id = c.uuid AND p.user_id = ?
         WHERE NOT EXISTS (
             SELECT 1 FROM chat_deletions d WHERE d.chat_id = c.uuid AND d.user_id = ?
         )
         ORDER BY c.last_updated DESC",
    )
    .bind(&user_id)
    .bind(&user_id)
    .fetch_all(&db_pool)
    .await?;

    let mut chats = Vec::with_capacity(ids.len());
    for (id,) in ids {
        chats.push(load_chat(&db_pool, Uuid::parse_str(&id)?).await?);
    }

    Ok(Json(json!({ "chats": chats })))
}
