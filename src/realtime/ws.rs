use axum::{debug_handler, extract::{ws::{Message, WebSocket}, State, WebSocketUpgrade}, response::IntoResponse};
use futures_util::{SinkExt, StreamExt};
use tower_sessions::Session;

use crate::chats;
use crate::session::current_user;
use crate::{AppError, AppResult, AppState};

use super::bus::{ConnId, Room};
use super::events::{ClientSignal, ServerEvent};

/// The single boundary between sockets and the stores/bus. The session is
/// read once at upgrade time; every join is checked against it.
#[debug_handler(state = AppState)]
pub(crate) async fn gateway(
    State(state): State<AppState>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let session_user = current_user(&session).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, session_user)))
}

async fn handle_socket(socket: WebSocket, state: AppState, session_user: Option<String>) {
    let (conn, mut events) = state.bus.register().await;
    tracing::debug!(%conn, user = ?session_user, "client connected");

    let (mut sink, mut stream) = socket.split();

    let forward_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Ok(frame) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Ok(signal) = serde_json::from_slice::<ClientSignal>(&msg.into_data()) else {
            continue;
        };
        if let Err(err) = handle_signal(&state, conn, session_user.as_deref(), signal).await {
            state
                .bus
                .send_to(conn, ServerEvent::Error { message: err.to_string() })
                .await;
        }
    }

    forward_task.abort();
    state.bus.disconnect(conn).await;
    tracing::debug!(%conn, "client disconnected");
}

async fn handle_signal(
    state: &AppState,
    conn: ConnId,
    session_user: Option<&str>,
    signal: ClientSignal,
) -> AppResult<()> {
    match signal {
        // Personal rooms are only for the identity the session vouches for.
        ClientSignal::Join(user_id) => {
            if session_user != Some(user_id.as_str()) {
                return Err(AppError::Unauthorized);
            }
            state.bus.join(conn, Room::User(user_id)).await;
        }
        ClientSignal::JoinChat(chat_id) => {
            let user_id = session_user.ok_or(AppError::Unauthorized)?;
            if !chats::chat_exists(&state.db_pool, chat_id).await? {
                return Err(AppError::ChatNotFound);
            }
            if !chats::is_participant(&state.db_pool, chat_id, user_id).await? {
                return Err(AppError::NotParticipant);
            }
            state.bus.join(conn, Room::Chat(chat_id)).await;
        }
        ClientSignal::LeaveChat(chat_id) => {
            state.bus.leave(conn, Room::Chat(chat_id)).await;
        }
        ClientSignal::ChatMessage(send) => {
            chats::append_message(
                &state.db_pool,
                &state.bus,
                send.chat_id,
                &send.sender_id,
                &send.content,
            )
            .await?;
        }
        // After a partial REST delete the deleting client tells the chat
        // room itself; the server only relays.
        ClientSignal::DeleteChat(chat_id) => {
            state
                .bus
                .publish(&Room::Chat(chat_id), ServerEvent::ChatDeleted { chat_id })
                .await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Clients;
    use crate::db;
    use crate::realtime::{EventBus, SendMessage};
    use serde_json::json;
    use uuid::Uuid;

    async fn test_state() -> AppState {
        AppState {
            db_pool: db::test_pool().await,
            clients: Clients::from_json(json!({}), "http://localhost:5000").unwrap(),
            bus: EventBus::new(),
        }
    }

    #[tokio::test]
    async fn join_is_gated_to_the_session_user() {
        let state = test_state().await;
        let (conn, mut rx) = state.bus.register().await;

        let err = handle_signal(&state, conn, Some("u1"), ClientSignal::Join("u2".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
        let err = handle_signal(&state, conn, None, ClientSignal::Join("u2".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        handle_signal(&state, conn, Some("u1"), ClientSignal::Join("u1".to_owned()))
            .await
            .unwrap();
        state
            .bus
            .publish(&Room::User("u1".to_owned()), ServerEvent::ChatStart { chat_id: Uuid::nil() })
            .await;
        assert!(matches!(rx.recv().await, Some(ServerEvent::ChatStart { .. })));
    }

    #[tokio::test]
    async fn chat_rooms_admit_only_participants() {
        let state = test_state().await;
        db::seed_user(&state.db_pool, "u1", "Alice Example").await;
        db::seed_user(&state.db_pool, "u2", "Bob Example").await;
        db::seed_user(&state.db_pool, "u3", "Cara Example").await;
        let chat_id = crate::chats::create_direct(&state.db_pool, "u1", "u2").await;
        let (conn, _rx) = state.bus.register().await;

        let err = handle_signal(&state, conn, Some("u3"), ClientSignal::JoinChat(chat_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotParticipant));

        let err = handle_signal(&state, conn, Some("u1"), ClientSignal::JoinChat(Uuid::now_v7()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ChatNotFound));

        handle_signal(&state, conn, Some("u1"), ClientSignal::JoinChat(chat_id))
            .await
            .unwrap();

        // leaving twice stays silent
        handle_signal(&state, conn, Some("u1"), ClientSignal::LeaveChat(chat_id))
            .await
            .unwrap();
        handle_signal(&state, conn, Some("u1"), ClientSignal::LeaveChat(chat_id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn inbound_message_persists_then_fans_out() {
        let state = test_state().await;
        db::seed_user(&state.db_pool, "u1", "Alice Example").await;
        db::seed_user(&state.db_pool, "u2", "Bob Example").await;
        let chat_id = crate::chats::create_direct(&state.db_pool, "u1", "u2").await;

        let (viewer, mut viewer_rx) = state.bus.register().await;
        handle_signal(&state, viewer, Some("u2"), ClientSignal::JoinChat(chat_id))
            .await
            .unwrap();

        let (sender, _rx) = state.bus.register().await;
        handle_signal(
            &state,
            sender,
            Some("u1"),
            ClientSignal::ChatMessage(SendMessage {
                chat_id,
                content: "hello".to_owned(),
                sender_id: "u1".to_owned(),
            }),
        )
        .await
        .unwrap();

        let Some(ServerEvent::ChatMessage(message)) = viewer_rx.recv().await else {
            panic!("expected chat:message");
        };
        assert_eq!(message.content, "hello");

        let chat = crate::chats::load_chat(&state.db_pool, chat_id).await.unwrap();
        assert_eq!(chat.messages.len(), 1);
    }

    #[tokio::test]
    async fn delete_chat_signal_relays_to_the_chat_room() {
        let state = test_state().await;
        db::seed_user(&state.db_pool, "u1", "Alice Example").await;
        db::seed_user(&state.db_pool, "u2", "Bob Example").await;
        let chat_id = crate::chats::create_direct(&state.db_pool, "u1", "u2").await;

        let (tab, mut tab_rx) = state.bus.register().await;
        handle_signal(&state, tab, Some("u2"), ClientSignal::JoinChat(chat_id))
            .await
            .unwrap();

        let (deleter, _rx) = state.bus.register().await;
        handle_signal(&state, deleter, Some("u1"), ClientSignal::DeleteChat(chat_id))
            .await
            .unwrap();

        let Some(ServerEvent::ChatDeleted { chat_id: deleted }) = tab_rx.recv().await else {
            panic!("expected relayed chat:deleted");
        };
        assert_eq!(deleted, chat_id);
    }
}
