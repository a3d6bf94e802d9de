//! Room registry and in-process event fan-out.
//!
//! Connections register once and get an unbounded receiver; rooms are joined
//! and left by name. Publishing clones the event to every member's channel,
//! so a single connection sees events in publish order across all of its
//! rooms. Rooms nobody has joined are valid empty sets.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::events::ServerEvent;

pub type ConnId = Uuid;

/// The two room kinds: one per user, one per open chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    User(String),
    Chat(Uuid),
}

#[derive(Default)]
struct Registry {
    conns: HashMap<ConnId, mpsc::UnboundedSender<ServerEvent>>,
    rooms: HashMap<Room, HashSet<ConnId>>,
    joined: HashMap<ConnId, HashSet<Room>>,
}

/// Cloneable handle shared through `AppState`.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<RwLock<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and hand back its delivery channel.
    pub async fn register(&self) -> (ConnId, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn = Uuid::now_v7();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut reg = self.inner.write().await;
        reg.conns.insert(conn, tx);
        reg.joined.insert(conn, HashSet::new());
        (conn, rx)
    }

    /// Idempotent; a join from an unregistered connection is ignored.
    pub async fn join(&self, conn: ConnId, room: Room) {
        let mut reg = self.inner.write().await;
        if !reg.conns.contains_key(&conn) {
            return;
        }
        reg.rooms.entry(room.clone()).or_default().insert(conn);
        reg.joined.entry(conn).or_default().insert(room);
    }

    /// Idempotent; leaving a room never joined is a no-op.
    pub async fn leave(&self, conn: ConnId, room: Room) {
        let mut reg = self.inner.write().await;
        Self::drop_member(&mut reg, &room, conn);
        if let Some(rooms) = reg.joined.get_mut(&conn) {
            rooms.remove(&room);
        }
    }

    fn drop_member(reg: &mut Registry, room: &Room, conn: ConnId) {
        let drained = reg
            .rooms
            .get_mut(room)
            .map(|members| {
                members.remove(&conn);
                members.is_empty()
            })
            .unwrap_or(false);
        if drained {
            reg.rooms.remove(room);
        }
    }

    /// Deliver `event` to every current member of `room`. A room with no
    /// members is a no-op, not an error. Delivery failures (receiver already
    /// gone) are logged and never surfaced to the caller.
    pub async fn publish(&self, room: &Room, event: ServerEvent) {
        let reg = self.inner.read().await;
        let Some(members) = reg.rooms.get(room) else {
            return;
        };
        for conn in members {
            if let Some(tx) = reg.conns.get(conn) {
                if tx.send(event.clone()).is_err() {
                    tracing::debug!(?room, %conn, "dropping event for vanished connection");
                }
            }
        }
    }

    /// Deliver directly to one connection (error replies to inbound signals).
    pub async fn send_to(&self, conn: ConnId, event: ServerEvent) {
        let reg = self.inner.read().await;
        if let Some(tx) = reg.conns.get(&conn) {
            let _ = tx.send(event);
        }
    }

    /// Drop the connection and sweep it out of every room it joined.
    pub async fn disconnect(&self, conn: ConnId) {
        let mut reg = self.inner.write().await;
        reg.conns.remove(&conn);
        let Some(rooms) = reg.joined.remove(&conn) else {
            return;
        };
        for room in rooms {
            Self::drop_member(&mut reg, &room, conn);
        }
    }

    #[cfg(test)]
    pub(crate) async fn member_count(&self, room: &Room) -> usize {
        self.inner.read().await.rooms.get(room).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(message: &str) -> ServerEvent {
        ServerEvent::Error { message: message.to_owned() }
    }

    #[tokio::test]
    async fn publish_reaches_every_member() {
        let bus = EventBus::new();
        let (a, mut rx_a) = bus.register().await;
        let (b, mut rx_b) = bus.register().await;
        let room = Room::User("u1".to_owned());
        bus.join(a, room.clone()).await;
        bus.join(b, room.clone()).await;

        bus.publish(&room, probe("hello")).await;

        assert!(matches!(rx_a.recv().await, Some(ServerEvent::Error { .. })));
        assert!(matches!(rx_b.recv().await, Some(ServerEvent::Error { .. })));
    }

    #[tokio::test]
    async fn publish_to_empty_room_is_noop() {
        let bus = EventBus::new();
        bus.publish(&Room::User("nobody".to_owned()), probe("dropped")).await;
        bus.publish(&Room::Chat(Uuid::now_v7()), probe("dropped")).await;
    }

    #[tokio::test]
    async fn join_and_leave_are_idempotent() {
        let bus = EventBus::new();
        let (a, _rx) = bus.register().await;
        let room = Room::Chat(Uuid::now_v7());

        bus.join(a, room.clone()).await;
        bus.join(a, room.clone()).await;
        assert_eq!(bus.member_count(&room).await, 1);

        bus.leave(a, room.clone()).await;
        bus.leave(a, room.clone()).await;
        assert_eq!(bus.member_count(&room).await, 0);
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order_across_rooms() {
        let bus = EventBus::new();
        let (a, mut rx) = bus.register().await;
        let personal = Room::User("u1".to_owned());
        let chat = Room::Chat(Uuid::now_v7());
        bus.join(a, personal.clone()).await;
        bus.join(a, chat.clone()).await;

        for i in 0..10 {
            let room = if i % 2 == 0 { &personal } else { &chat };
            bus.publish(room, probe(&i.to_string())).await;
        }

        for i in 0..10 {
            let Some(ServerEvent::Error { message }) = rx.recv().await else {
                panic!("channel closed early");
            };
            assert_eq!(message, i.to_string());
        }
    }

    #[tokio::test]
    async fn disconnect_sweeps_all_rooms() {
        let bus = EventBus::new();
        let (a, rx) = bus.register().await;
        let personal = Room::User("u1".to_owned());
        let chat = Room::Chat(Uuid::now_v7());
        bus.join(a, personal.clone()).await;
        bus.join(a, chat.clone()).await;
        drop(rx);

        bus.disconnect(a).await;

        assert_eq!(bus.member_count(&personal).await, 0);
        assert_eq!(bus.member_count(&chat).await, 0);
        // publishing to the former rooms must not error
        bus.publish(&personal, probe("late")).await;
        bus.publish(&chat, probe("late")).await;
    }

    #[tokio::test]
    async fn join_after_disconnect_is_ignored() {
        let bus = EventBus::new();
        let (a, _rx) = bus.register().await;
        bus.disconnect(a).await;

        let room = Room::User("u1".to_owned());
        bus.join(a, room.clone()).await;
        assert_eq!(bus.member_count(&room).await, 0);
    }
}
