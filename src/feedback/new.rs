use axum::{debug_handler, extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::session::require_user;
use crate::{AppError, AppResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeedbackBody {
    interface_rating: i64,
    journey_rating: i64,
    functionality_rating: i64,
    #[serde(default)]
    message: String,
}

#[debug_handler]
pub(crate) async fn post_feedback(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(body): Json<FeedbackBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user_id = require_user(&session).await?;

    let ratings = [body.interface_rating, body.journey_rating, body.functionality_rating];
    if ratings.iter().any(|r| !(1..=5).contains(r)) {
        return Err(AppError::InvalidRating);
    }

    let feedback_id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO feedback
         (uuid,user_id,interface_rating,journey_rating,functionality_rating,message,created_at)
         VALUES (?,?,?,?,?,?,?)",
    )
    .bind(feedback_id.to_string())
    .bind(&user_id)
    .bind(body.interface_rating)
    .bind(body.journey_rating)
    .bind(body.functionality_rating)
    .bind(&body.message)
    .bind(Utc::now())
    .execute(&db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "feedback": feedback_id }))))
}
