use axum::{debug_handler, extract::State, Json};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::session::require_user;
use crate::AppResult;

use super::{load_user, UserRef};

#[debug_handler]
pub(crate) async fn me(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<UserRef>> {
    let user_id = require_user(&session).await?;
    Ok(Json(load_user(&db_pool, user_id.as_str()).await?))
}
