use axum::{debug_handler, extract::{Path, State}, Json};
use chrono::Utc;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::chats;
use crate::realtime::{EventBus, Room, ServerEvent};
use crate::session::require_user;
use crate::{AppError, AppResult, AppState};

use super::{load_request, SwapRequestDoc, SwapStatus};

#[debug_handler(state = AppState)]
pub(crate) async fn accept(
    Path(request_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(bus): State<EventBus>,
    session: Session,
) -> AppResult<Json<SwapRequestDoc>> {
    let user_id = require_user(&session).await?;
    let (request, _) = accept_request(&db_pool, &bus, request_id, &user_id).await?;
    Ok(Json(request))
}

#[debug_handler(state = AppState)]
pub(crate) async fn reject(
    Path(request_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(bus): State<EventBus>,
    session: Session,
) -> AppResult<Json<SwapRequestDoc>> {
    let user_id = require_user(&session).await?;
    let request = reject_request(&db_pool, &bus, request_id, &user_id).await?;
    Ok(Json(request))
}

/// Accept: receiver-only, pending-only. The status write and the new chat
/// are one transaction; only after it commits do both parties get
/// `swapRequest:update` and then `chat:start`.
pub async fn accept_request(
    db_pool: &SqlitePool,
    bus: &EventBus,
    request_id: Uuid,
    user_id: &str,
) -> AppResult<(SwapRequestDoc, Uuid)> {
    let mut tx = db_pool.begin().await?;
    let (sender_id, receiver_id) = guard_transition(&mut tx, request_id, user_id).await?;

    sqlx::query("UPDATE swap_requests SET status='accepted', updated_at=? WHERE uuid=?")
        .bind(Utc::now())
        .bind(request_id.to_string())
        .execute(&mut *tx)
        .await?;
    let chat_id = chats::create_for_swap(&mut tx, &sender_id, &receiver_id).await?;
    tx.commit().await?;

    tracing::info!(%request_id, %chat_id, "swap accepted");
    let request = load_request(db_pool, request_id).await?;
    for party in [&sender_id, &receiver_id] {
        bus.publish(
            &Room::User(party.clone()),
            ServerEvent::SwapRequestUpdate(request.clone()),
        )
        .await;
    }
    for party in [&sender_id, &receiver_id] {
        bus.publish(&Room::User(party.clone()), ServerEvent::ChatStart { chat_id }).await;
    }
    Ok((request, chat_id))
}

/// Reject: receiver-only, pending-only; no chat.
pub async fn reject_request(
    db_pool: &SqlitePool,
    bus: &EventBus,
    request_id: Uuid,
    user_id: &str,
) -> AppResult<SwapRequestDoc> {
    let mut tx = db_pool.begin().await?;
    let (sender_id, receiver_id) = guard_transition(&mut tx, request_id, user_id).await?;

    sqlx::query("UPDATE swap_requests SET status='rejected', updated_at=? WHERE uuid=?")
        .bind(Utc::now())
        .bind(request_id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let request = load_request(db_pool, request_id).await?;
    for party in [&sender_id, &receiver_id] {
        bus.publish(
            &Room::User(party.clone()),
            ServerEvent::SwapRequestUpdate(request.clone()),
        )
        .await;
    }
    Ok(request)
}

async fn guard_transition(
    tx: &mut sqlx::SqliteConnection,
    request_id: Uuid,
    user_id: &str,
) -> AppResult<(String, String)> {
    let Some((sender_id, receiver_id, status)): Option<(String, String, String)> =
        sqlx::query_as("SELECT sender_id,receiver_id,status FROM swap_requests WHERE uuid=?")
            .bind(request_id.to_string())
            .fetch_optional(&mut *tx)
            .await?
    else {
        return Err(AppError::RequestNotFound);
    };
    if receiver_id != user_id {
        return Err(AppError::Unauthorized);
    }
    if SwapStatus::parse(&status)? != SwapStatus::Pending {
        return Err(AppError::NotPending);
    }
    Ok((sender_id, receiver_id))
}
