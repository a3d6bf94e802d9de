use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("message content cannot be empty")]
    InvalidMessage,

    #[error("chat not found")]
    ChatNotFound,

    #[error("request not found")]
    RequestNotFound,

    #[error("item not found")]
    ItemNotFound,

    #[error("not authorized")]
    Unauthorized,

    #[error("request not pending")]
    NotPending,

    #[error("request already exists")]
    DuplicateRequest,

    #[error("cannot swap with yourself")]
    SelfSwap,

    #[error("not a participant of this chat")]
    NotParticipant,

    #[error("all ratings must be between 1 and 5 stars")]
    InvalidRating,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn msg(msg: impl Into<String>) -> Self {
        Self::Internal(anyhow::Error::msg(msg.into()))
    }

    fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            InvalidMessage | NotPending | DuplicateRequest | SelfSwap | InvalidRating => StatusCode::BAD_REQUEST,
            ChatNotFound | RequestNotFound | ItemNotFound => StatusCode::NOT_FOUND,
            Unauthorized | NotParticipant => StatusCode::FORBIDDEN,
            Database(_) | Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Internal(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(reqwest::Error);
apperr_impl!(std::io::Error);
apperr_impl!(uuid::Error);

impl<E: core::error::Error + Send + Sync + 'static, R: oauth2::ErrorResponse + Send + Sync + 'static> From<oauth2::RequestTokenError<E, R>> for AppError {
    fn from(err: oauth2::RequestTokenError<E, R>) -> Self {
        Self::Internal(anyhow::Error::from(err))
    }
}
