mod delete;
mod list;
mod new;

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::UserRef;
use crate::{AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::all_items).post(new::post_item))
        .route("/mine", get(list::my_items))
        .route("/others", get(list::other_items))
        .route("/{uuid}", get(list::one_item).delete(delete::delete_item))
}

/// Item listing with its owner populated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDoc {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub condition: String,
    pub images: Option<String>,
    pub user: UserRef,
    pub created_at: DateTime<Utc>,
}

type ItemRow = (String, String, String, String, String, Option<String>, String, String, DateTime<Utc>);

const ITEM_COLUMNS: &str =
    "i.uuid,i.title,i.category,i.description,i.condition,i.image_url,i.user_id,u.fullname,i.created_at";

fn item_from_row(
    (id, title, category, description, condition, images, user_id, fullname, created_at): ItemRow,
) -> AppResult<ItemDoc> {
    Ok(ItemDoc {
        id: Uuid::parse_str(&id)?,
        title,
        category,
        description,
        condition,
        images,
        user: UserRef { id: user_id, fullname },
        created_at,
    })
}

pub async fn load_item(db_pool: &SqlitePool, item_id: Uuid) -> AppResult<ItemDoc> {
    let row: Option<ItemRow> = sqlx::query_as(&format!(
        "SELECT {ITEM_COLUMNS} FROM items i JOIN users u ON u.id = i.user_id WHERE i.uuid=?"
    ))
    .bind(item_id.to_string())
    .fetch_optional(db_pool)
    .await?;
    item_from_row(row.ok_or(AppError::ItemNotFound)?)
}

#[cfg(test)]
pub(crate) async fn seed_item(db_pool: &SqlitePool, owner: &str, title: &str) -> Uuid {
    let item_id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO items (uuid,user_id,title,category,description,condition,created_at)
         VALUES (?,?,?,?,?,?,?)",
    )
    .bind(item_id.to_string())
    .bind(owner)
    .bind(title)
    .bind("misc")
    .bind("a thing")
    .bind("used")
    .bind(Utc::now())
    .execute(db_pool)
    .await
    .unwrap();
    item_id
}
