use axum::{debug_handler, extract::{Path, State}, Json};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::session::require_user;
use crate::{AppError, AppResult};

use super::{load_chat, ChatDoc};

/// Single chat by id, participant-gated.
#[debug_handler]
pub(crate) async fn chat(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<ChatDoc>> {
    let user_id = require_user(&session).await?;
    let chat = load_chat(&db_pool, chat_id).await?;
    if !chat.participants.iter().any(|p| p.id == user_id) {
        return Err(AppError::Unauthorized);
    }
    Ok(Json(chat))
}
