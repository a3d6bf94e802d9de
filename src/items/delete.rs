use axum::{debug_handler, extract::{Path, State}, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::session::require_user;
use crate::{AppError, AppResult};

use super::load_item;

#[debug_handler]
pub(crate) async fn delete_item(
    Path(item_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Value>> {
    let user_id = require_user(&session).await?;

    let item = load_item(&db_pool, item_id).await?;
    if item.user.id != user_id {
        return Err(AppError::Unauthorized);
    }

    sqlx::query("DELETE FROM items WHERE uuid=?")
        .bind(item_id.to_string())
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({ "message": "Item deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use crate::db;
    use crate::items::{load_item, seed_item};
    use crate::AppError;

    #[tokio::test]
    async fn load_after_delete_is_not_found() {
        let pool = db::test_pool().await;
        db::seed_user(&pool, "u1", "Alice Example").await;
        let item_id = seed_item(&pool, "u1", "camp stove").await;

        assert_eq!(load_item(&pool, item_id).await.unwrap().title, "camp stove");

        sqlx::query("DELETE FROM items WHERE uuid=?")
            .bind(item_id.to_string())
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            load_item(&pool, item_id).await.unwrap_err(),
            AppError::ItemNotFound
        ));
    }
}
