use axum::{debug_handler, extract::{Path, State}, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::session::{current_user, require_user};
use crate::AppResult;

use super::{item_from_row, load_item, ItemDoc, ItemRow, ITEM_COLUMNS};

async fn fetch_items(
    db_pool: &SqlitePool,
    filter: &str,
    bind: Option<&str>,
) -> AppResult<Vec<ItemDoc>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM items i JOIN users u ON u.id = i.user_id
         {filter} ORDER BY i.created_at DESC"
    );
    let mut query = sqlx::query_as::<_, ItemRow>(&sql);
    if let Some(value) = bind {
        query = query.bind(value.to_owned());
    }
    let rows = query.fetch_all(db_pool).await?;
    rows.into_iter().map(item_from_row).collect()
}

#[debug_handler]
pub(crate) async fn all_items(State(db_pool): State<SqlitePool>) -> AppResult<Json<Value>> {
    let items = fetch_items(&db_pool, "", None).await?;
    Ok(Json(json!({ "items": items })))
}

#[debug_handler]
pub(crate) async fn my_items(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Value>> {
    let user_id = require_user(&session).await?;
    let items = fetch_items(&db_pool, "WHERE i.user_id = ?", Some(&user_id)).await?;
    Ok(Json(json!({ "items": items })))
}

/// Everyone else's listings; falls back to all items when logged out.
#[debug_handler]
pub(crate) async fn other_items(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Value>> {
    let items = match current_user(&session).await? {
        Some(user_id) => fetch_items(&db_pool, "WHERE i.user_id <> ?", Some(&user_id)).await?,
        None => fetch_items(&db_pool, "", None).await?,
    };
    Ok(Json(json!({ "items": items })))
}

#[debug_handler]
pub(crate) async fn one_item(
    Path(item_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<ItemDoc>> {
    Ok(Json(load_item(&db_pool, item_id).await?))
}
