mod delete;
mod list;
mod new;
mod respond;

use axum::{routing::{delete, get, put}, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::UserRef;
use crate::items::{load_item, ItemDoc};
use crate::{AppError, AppResult, AppState};

pub use respond::{accept_request, reject_request};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::requests).post(new::new_request))
        .route("/{uuid}/accept", put(respond::accept))
        .route("/{uuid}/reject", put(respond::reject))
        .route("/{uuid}", delete(delete::delete_request))
}

/// `pending → accepted` and `pending → rejected` are the only transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SwapStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SwapStatus::Pending => "pending",
            SwapStatus::Accepted => "accepted",
            SwapStatus::Rejected => "rejected",
        }
    }

    pub(crate) fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "pending" => Ok(SwapStatus::Pending),
            "accepted" => Ok(SwapStatus::Accepted),
            "rejected" => Ok(SwapStatus::Rejected),
            other => Err(AppError::msg(format!("unknown swap status {other}"))),
        }
    }
}

/// Fully populated swap request, as served over REST and published on the bus.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequestDoc {
    pub id: Uuid,
    pub sender: UserRef,
    pub receiver: UserRef,
    pub offered_item: ItemDoc,
    pub desired_item: ItemDoc,
    pub status: SwapStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn load_request(db_pool: &SqlitePool, request_id: Uuid) -> AppResult<SwapRequestDoc> {
    let Some(row): Option<(String, String, String, String, String, String, String, DateTime<Utc>, DateTime<Utc>)> =
        sqlx::query_as(
            "SELECT r.sender_id,su.fullname,r.receiver_id,ru.fullname,
                    r.offered_item,r.desired_item,r.status,r.created_at,r.updated_at
             FROM swap_requests r
             JOIN users su ON su.id = r.sender_id
             JOIN users ru ON ru.id = r.receiver_id
             WHERE r.uuid=?",
        )
        .bind(request_id.to_string())
        .fetch_optional(db_pool)
        .await?
    else {
        return Err(AppError::RequestNotFound);
    };
    let (sender_id, sender_name, receiver_id, receiver_name, offered, desired, status, created_at, updated_at) = row;

    Ok(SwapRequestDoc {
        id: request_id,
        sender: UserRef { id: sender_id, fullname: sender_name },
        receiver: UserRef { id: receiver_id, fullname: receiver_name },
        offered_item: load_item(db_pool, Uuid::parse_str(&offered)?).await?,
        desired_item: load_item(db_pool, Uuid::parse_str(&desired)?).await?,
        status: SwapStatus::parse(&status)?,
        created_at,
        updated_at,
    })
}
