pub mod auth;
pub mod chats;
pub mod db;
pub mod error;
pub mod feedback;
pub mod items;
pub mod realtime;
pub mod session;
pub mod swaps;

use axum::extract::FromRef;
use serde_json::Value;
use sqlx::SqlitePool;

pub use error::{AppError, AppResult};
pub use realtime::EventBus;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub clients: auth::Clients,
    pub bus: EventBus,
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_obj_field(&self, field: &str) -> AppResult<&Value>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or_else(|| AppError::msg(format!("expected {field} in {self}")))?
            .as_str()
            .ok_or_else(|| AppError::msg(format!("expected {field} in {self} to be string")))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> AppResult<&Value> {
        self.get(field)
        .ok_or_else(|| AppError::msg(format!("expected {field} in {self}")))
    }
}
