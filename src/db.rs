use std::str::FromStr;

use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, SqlitePool};

use crate::AppResult;

pub async fn connect(database_url: &str) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Idempotent schema bootstrap, run once at startup.
pub async fn init_schema(pool: &SqlitePool) -> AppResult<()> {
    const SCHEMA: &[&str] = &[
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            fullname TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            provider TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS items (
            uuid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            title TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL,
            condition TEXT NOT NULL,
            image_url TEXT,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS swap_requests (
            uuid TEXT PRIMARY KEY,
            sender_id TEXT NOT NULL REFERENCES users(id),
            receiver_id TEXT NOT NULL REFERENCES users(id),
            offered_item TEXT NOT NULL REFERENCES items(uuid) ON DELETE CASCADE,
            desired_item TEXT NOT NULL REFERENCES items(uuid) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS swap_request_deletions (
            request_id TEXT NOT NULL REFERENCES swap_requests(uuid) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id),
            PRIMARY KEY (request_id, user_id)
        )",
        "CREATE TABLE IF NOT EXISTS chats (
            uuid TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            last_updated TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS chat_participants (
            chat_id TEXT NOT NULL REFERENCES chats(uuid) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id),
            PRIMARY KEY (chat_id, user_id)
        )",
        "CREATE TABLE IF NOT EXISTS chat_messages (
            id TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL REFERENCES chats(uuid) ON DELETE CASCADE,
            sender_id TEXT NOT NULL REFERENCES users(id),
            content TEXT NOT NULL,
            sent_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS chat_deletions (
            chat_id TEXT NOT NULL REFERENCES chats(uuid) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id),
            PRIMARY KEY (chat_id, user_id)
        )",
        "CREATE TABLE IF NOT EXISTS feedback (
            uuid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            interface_rating INTEGER NOT NULL,
            journey_rating INTEGER NOT NULL,
            functionality_rating INTEGER NOT NULL,
            message TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_requests_pending_pair
         ON swap_requests(offered_item, desired_item) WHERE status='pending'",
        "CREATE INDEX IF NOT EXISTS idx_messages_chat ON chat_messages(chat_id)",
        "CREATE INDEX IF NOT EXISTS idx_requests_parties ON swap_requests(sender_id, receiver_id)",
        "CREATE INDEX IF NOT EXISTS idx_items_owner ON items(user_id)",
    ];

    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}

#[cfg(test)]
pub async fn seed_user(pool: &SqlitePool, id: &str, fullname: &str) {
    sqlx::query("INSERT INTO users (id,fullname,email,provider,created_at) VALUES (?,?,?,?,?)")
        .bind(id)
        .bind(fullname)
        .bind(format!("{id}@example.com"))
        .bind("google")
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .unwrap();
}
