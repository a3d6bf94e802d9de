use axum::{debug_handler, extract::{Path, State}, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::realtime::{EventBus, Room, ServerEvent};
use crate::session::require_user;
use crate::{AppError, AppResult, AppState};

#[debug_handler(state = AppState)]
pub(crate) async fn delete_request(
    Path(request_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(bus): State<EventBus>,
    session: Session,
) -> AppResult<Json<Value>> {
    let user_id = require_user(&session).await?;
    hide_for_user(&db_pool, &bus, request_id, &user_id).await?;
    Ok(Json(json!({ "message": "Request deleted successfully" })))
}

/// Each side hides the request from its own view independently; there is no
/// purge once both have, a settled request just stays hidden. Only the
/// deleting user's personal room hears about it.
pub async fn hide_for_user(
    db_pool: &SqlitePool,
    bus: &EventBus,
    request_id: Uuid,
    user_id: &str,
) -> AppResult<()> {
    let Some((sender_id, receiver_id)): Option<(String, String)> =
        sqlx::query_as("SELECT sender_id,receiver_id FROM swap_requests WHERE uuid=?")
            .bind(request_id.to_string())
            .fetch_optional(db_pool)
            .await?
    else {
        return Err(AppError::RequestNotFound);
    };
    if user_id != sender_id && user_id != receiver_id {
        return Err(AppError::Unauthorized);
    }

    sqlx::query("INSERT OR IGNORE INTO swap_request_deletions (request_id,user_id) VALUES (?,?)")
        .bind(request_id.to_string())
        .bind(user_id)
        .execute(db_pool)
        .await?;

    bus.publish(
        &Room::User(user_id.to_owned()),
        ServerEvent::SwapRequestDelete { request_id },
    )
    .await;
    Ok(())
}
