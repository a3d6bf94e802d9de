use axum::{debug_handler, extract::State, Json};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::session::require_user;
use crate::AppResult;

use super::{load_request, SwapRequestDoc};

/// Requests the caller is a party to and has not deleted, newest first.
#[debug_handler]
pub(crate) async fn requests(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<SwapRequestDoc>>> {
    let user_id = require_user(&session).await?;

    let ids = sqlx::query_as::<_, (String,)>(
        "SELECT r.uuid FROM swap_requests r
         WHERE (r.sender_id = ? OR r.receiver_id = ?)
         AND NOT EXISTS (
             SELECT 1 FROM swap_request_deletions d
             WHERE d.request_id = r.uuid AND d.user_id = ?
         )
         ORDER BY r.created_at DESC",
    )
    .bind(&user_id)
    .bind(&user_id)
    .bind(&user_id)
    .fetch_all(&db_pool)
    .await?;

    let mut requests = Vec::with_capacity(ids.len());
    for (id,) in ids {
        requests.push(load_request(&db_pool, Uuid::parse_str(&id)?).await?);
    }
    Ok(Json(requests))
}
