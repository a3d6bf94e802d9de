mod bus;
mod events;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use bus::{ConnId, EventBus, Room};
pub use events::{ClientSignal, SendMessage, ServerEvent};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::gateway))
}
