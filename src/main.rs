use axum::Router;
use swaptrade::{auth, chats, db, feedback, items, realtime, swaps, AppState, EventBus};
use tower_http::cors::CorsLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("swaptrade=info")),
        )
        .init();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(30)));

    let database_url =
        dotenv::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://swaptrade.db".to_owned());
    let db_pool = db::connect(&database_url).await?;

    let secrets_path =
        dotenv::var("OAUTH_CLIENT_FILE").unwrap_or_else(|_| "client_secret.json".to_owned());
    let server_url =
        dotenv::var("SERVER_URL").unwrap_or_else(|_| "http://localhost:5000".to_owned());
    let clients = auth::Clients::from_json(
        serde_json::from_str(&std::fs::read_to_string(&secrets_path)?)?,
        &server_url,
    )?;

    let app_state = AppState {
        db_pool,
        clients,
        bus: EventBus::new(),
    };

    let app = Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api/items", items::router())
        .nest("/api/swaps", swaps::router())
        .nest("/api/chats", chats::router())
        .nest("/api/feedback", feedback::router())
        .merge(realtime::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive());

    let port = dotenv::var("PORT").unwrap_or_else(|_| "5000".to_owned());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(%port, "server running");
    axum::serve(listener, app).await?;
    Ok(())
}
