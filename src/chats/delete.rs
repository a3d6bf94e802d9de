use axum::{debug_handler, extract::{Path, State}, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::realtime::{EventBus, Room, ServerEvent};
use crate::session::require_user;
use crate::{AppError, AppResult, AppState};

#[debug_handler(state = AppState)]
pub(crate) async fn delete_chat(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(bus): State<EventBus>,
    session: Session,
) -> AppResult<Json<Value>> {
    let user_id = require_user(&session).await?;
    let purged = delete_for_user(&db_pool, &bus, chat_id, &user_id).await?;
    Ok(Json(json!({ "deleted": purged })))
}

/// Hide the chat for one participant. Once every participant has deleted it
/// the chat is purged and `chat:deleted` goes to each former participant's
/// personal room. A partial delete publishes nothing server-side; the
/// deleting client notifies the chat room itself over the gateway.
///
/// Returns whether the chat was purged.
pub async fn delete_for_user(
    db_pool: &SqlitePool,
    bus: &EventBus,
    chat_id: Uuid,
    user_id: &str,
) -> AppResult<bool> {
    let participants: Vec<(String,)> =
        sqlx::query_as("SELECT user_id FROM chat_participants WHERE chat_id=?")
            .bind(chat_id.to_string())
            .fetch_all(db_pool)
            .await?;
    if participants.is_empty() {
        return Err(AppError::ChatNotFound);
    }
    if !participants.iter().any(|(id,)| id == user_id) {
        return Err(AppError::Unauthorized);
    }

    let mut tx = db_pool.begin().await?;
    sqlx::query("INSERT OR IGNORE INTO chat_deletions (chat_id,user_id) VALUES (?,?)")
        .bind(chat_id.to_string())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    let (deleted_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM chat_deletions WHERE chat_id=?")
            .bind(chat_id.to_string())
            .fetch_one(&mut *tx)
            .await?;

    let purged = deleted_count as usize == participants.len();
    if purged {
        sqlx::query("DELETE FROM chats WHERE uuid=?")
            .bind(chat_id.to_string())
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    if purged {
        tracing::info!(%chat_id, "chat purged, all participants deleted");
        for (participant,) in participants {
            bus.publish(
                &Room::User(participant),
                ServerEvent::ChatDeleted { chat_id },
            )
            .await;
        }
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chats::{create_direct, load_chat};
    use crate::db;

    #[tokio::test]
    async fn each_side_deletes_independently_then_purge() {
        let pool = db::test_pool().await;
        let bus = EventBus::new();
        db::seed_user(&pool, "u1", "Alice Example").await;
        db::seed_user(&pool, "u2", "Bob Example").await;
        let chat_id = create_direct(&pool, "u1", "u2").await;

        let (alice, mut alice_rx) = bus.register().await;
        bus.join(alice, Room::User("u1".to_owned())).await;
        let (bob, mut bob_rx) = bus.register().await;
        bus.join(bob, Room::User("u2".to_owned())).await;

        // first delete hides, nothing is published, chat survives
        assert!(!delete_for_user(&pool, &bus, chat_id, "u1").await.unwrap());
        let chat = load_chat(&pool, chat_id).await.unwrap();
        assert_eq!(chat.deleted_by, vec!["u1".to_owned()]);
        assert!(alice_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_err());

        // second delete purges and notifies both former participants
        assert!(delete_for_user(&pool, &bus, chat_id, "u2").await.unwrap());
        assert!(matches!(
            load_chat(&pool, chat_id).await.unwrap_err(),
            AppError::ChatNotFound
        ));
        for rx in [&mut alice_rx, &mut bob_rx] {
            let Some(ServerEvent::ChatDeleted { chat_id: deleted }) = rx.recv().await else {
                panic!("expected chat:deleted");
            };
            assert_eq!(deleted, chat_id);
        }
        // exactly once each
        assert!(alice_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn delete_is_idempotent_per_user() {
        let pool = db::test_pool().await;
        let bus = EventBus::new();
        db::seed_user(&pool, "u1", "Alice Example").await;
        db::seed_user(&pool, "u2", "Bob Example").await;
        let chat_id = create_direct(&pool, "u1", "u2").await;

        assert!(!delete_for_user(&pool, &bus, chat_id, "u1").await.unwrap());
        assert!(!delete_for_user(&pool, &bus, chat_id, "u1").await.unwrap());
        let chat = load_chat(&pool, chat_id).await.unwrap();
        assert_eq!(chat.deleted_by, vec!["u1".to_owned()]);
    }

    #[tokio::test]
    async fn outsiders_cannot_delete() {
        let pool = db::test_pool().await;
        let bus = EventBus::new();
        db::seed_user(&pool, "u1", "Alice Example").await;
        db::seed_user(&pool, "u2", "Bob Example").await;
        db::seed_user(&pool, "u3", "Cara Example").await;
        let chat_id = create_direct(&pool, "u1", "u2").await;

        let err = delete_for_user(&pool, &bus, chat_id, "u3").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let err = delete_for_user(&pool, &bus, Uuid::now_v7(), "u1").await.unwrap_err();
        assert!(matches!(err, AppError::ChatNotFound));
    }
}
