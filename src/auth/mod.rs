mod clients;
mod lockin;
mod login;
mod logout;
mod me;

use axum::{routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{AppError, AppResult, AppState};

pub use clients::{ClientProvider, Clients};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/{provider}", get(login::login))
        .route("/lockin/{provider}", get(lockin::lockin))
        .route("/logout", get(logout::logout))
        .route("/me", get(me::me))
}

/// A user as referenced from populated documents.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    pub fullname: String,
}

pub async fn load_user(db_pool: &SqlitePool, user_id: &str) -> AppResult<UserRef> {
    let Some((fullname,)): Option<(String,)> =
        sqlx::query_as("SELECT fullname FROM users WHERE id=?")
            .bind(user_id)
            .fetch_optional(db_pool)
            .await?
    else {
        return Err(AppError::Unauthorized);
    };
    Ok(UserRef { id: user_id.to_owned(), fullname })
}

/// Find the account for this email or create one on first login.
pub(crate) async fn find_or_create_user(
    db_pool: &SqlitePool,
    fullname: &str,
    email: &str,
    provider: ClientProvider,
) -> AppResult<String> {
    if let Some((id,)) = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE email=?")
        .bind(email)
        .fetch_optional(db_pool)
        .await?
    {
        return Ok(id);
    }

    let id = Uuid::now_v7().to_string();
    sqlx::query("INSERT INTO users (id,fullname,email,provider,created_at) VALUES (?,?,?,?,?)")
        .bind(&id)
        .bind(fullname)
        .bind(email)
        .bind(provider.to_string().to_lowercase())
        .bind(Utc::now())
        .execute(db_pool)
        .await?;
    tracing::info!(user = %id, "new account");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn second_login_reuses_the_account() {
        let pool = db::test_pool().await;
        let first = find_or_create_user(&pool, "Alice Example", "alice@example.com", ClientProvider::Google)
            .await
            .unwrap();
        let second = find_or_create_user(&pool, "Alice E.", "alice@example.com", ClientProvider::Google)
            .await
            .unwrap();
        assert_eq!(first, second);

        let user = load_user(&pool, &first).await.unwrap();
        assert_eq!(user.fullname, "Alice Example");
    }
}
