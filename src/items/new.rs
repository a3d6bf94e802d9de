use axum::{debug_handler, extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::session::require_user;
use crate::AppResult;

use super::{load_item, ItemDoc};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewItemBody {
    title: String,
    category: String,
    description: String,
    condition: String,
    /// Already-hosted image URL; binary upload is not this server's job.
    images: Option<String>,
}

#[debug_handler]
pub(crate) async fn post_item(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(body): Json<NewItemBody>,
) -> AppResult<(StatusCode, Json<ItemDoc>)> {
    let user_id = require_user(&session).await?;

    let item_id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO items (uuid,user_id,title,category,description,condition,image_url,created_at)
         VALUES (?,?,?,?,?,?,?,?)",
    )
    .bind(item_id.to_string())
    .bind(&user_id)
    .bind(&body.title)
    .bind(&body.category)
    .bind(&body.description)
    .bind(&body.condition)
    .bind(&body.images)
    .bind(Utc::now())
    .execute(&db_pool)
    .await?;

    tracing::info!(%item_id, user = %user_id, "item listed");
    Ok((StatusCode::CREATED, Json(load_item(&db_pool, item_id).await?)))
}
