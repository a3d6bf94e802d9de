use axum::{debug_handler, extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::items::load_item;
use crate::realtime::{EventBus, Room, ServerEvent};
use crate::session::require_user;
use crate::{AppError, AppResult, AppState};

use super::{load_request, SwapRequestDoc};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewSwapBody {
    offered_item: Uuid,
    desired_item: Uuid,
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_request(
    State(db_pool): State<SqlitePool>,
    State(bus): State<EventBus>,
    session: Session,
    Json(NewSwapBody { offered_item, desired_item }): Json<NewSwapBody>,
) -> AppResult<(StatusCode, Json<SwapRequestDoc>)> {
    let user_id = require_user(&session).await?;
    let request = create_request(&db_pool, &bus, &user_id, offered_item, desired_item).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Validate the offer (caller owns the offered item, the desired item names
/// the receiver, no self-swap, no second pending request for the same pair),
/// persist it, then announce it to both parties.
pub async fn create_request(
    db_pool: &SqlitePool,
    bus: &EventBus,
    sender_id: &str,
    offered_item: Uuid,
    desired_item: Uuid,
) -> AppResult<SwapRequestDoc> {
    let offered = load_item(db_pool, offered_item).await?;
    if offered.user.id != sender_id {
        return Err(AppError::Unauthorized);
    }

    let desired = load_item(db_pool, desired_item).await?;
    let receiver_id = desired.user.id.clone();
    if receiver_id == sender_id {
        return Err(AppError::SelfSwap);
    }

    let pending_exists = sqlx::query_as::<_, (i64,)>(
        "SELECT 1 FROM swap_requests WHERE offered_item=? AND desired_item=? AND status='pending'",
    )
    .bind(offered_item.to_string())
    .bind(desired_item.to_string())
    .fetch_optional(db_pool)
    .await?
    .is_some();
    if pending_exists {
        return Err(AppError::DuplicateRequest);
    }

    let request_id = Uuid::now_v7();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO swap_requests
         (uuid,sender_id,receiver_id,offered_item,desired_item,status,created_at,updated_at)
         VALUES (?,?,?,?,?,'pending',?,?)",
    )
    .bind(request_id.to_string())
    .bind(sender_id)
    .bind(&receiver_id)
    .bind(offered_item.to_string())
    .bind(desired_item.to_string())
    .bind(now)
    .bind(now)
    .execute(db_pool)
    .await
    .map_err(|err| match &err {
        // the partial unique index catches a create racing the SELECT above
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::DuplicateRequest,
        _ => AppError::from(err),
    })?;

    let request = load_request(db_pool, request_id).await?;
    for party in [sender_id, receiver_id.as_str()] {
        bus.publish(
            &Room::User(party.to_owned()),
            ServerEvent::SwapRequestCreate(request.clone()),
        )
        .await;
    }
    Ok(request)
}
