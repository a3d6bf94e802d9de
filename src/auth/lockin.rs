use axum::{debug_handler, extract::{Path, Query, State}, response::{IntoResponse, Redirect}};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::session::{CSRF_STATE, PKCE_VERIFIER, RETURN_URL, USER_ID};
use crate::{AppError, AppResult, AppState, GetField};

use super::{clients::ClientProvider, find_or_create_user, Clients};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// OAuth callback: verify state, exchange the code, pull the provider
/// profile, land the user in a session.
#[debug_handler(state = AppState)]
pub(crate) async fn lockin(
    Path(provider): Path<ClientProvider>,
    Query(LockinQuery { state, code }): Query<LockinQuery>,
    State(db_pool): State<SqlitePool>,
    State(clients): State<Clients>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let state = CsrfToken::new(state.ok_or_else(|| AppError::msg("OAuth: without state"))?);
    let code = AuthorizationCode::new(code.ok_or_else(|| AppError::msg("OAuth: without code"))?);

    let Some(stored_state) = session.get::<String>(CSRF_STATE).await? else {
        return Err(AppError::msg("no csrf_state"));
    };
    if state.secret().as_str() != stored_state.as_str() {
        return Err(AppError::msg("csrf tokens don't match"));
    }

    let Some(pkce_verifier) = session.get::<String>(PKCE_VERIFIER).await? else {
        return Err(AppError::msg("no pkce_verifier"));
    };

    let client = clients.get_client(provider)?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await?;

    let access_token = token_result.access_token().secret();
    let (fullname, email) = fetch_profile(provider, &http_client, access_token).await?;

    let user_id = find_or_create_user(&db_pool, &fullname, &email, provider).await?;
    session.insert(USER_ID, user_id.clone()).await?;
    tracing::info!(user = %user_id, %provider, "logged in");

    let return_url: String = session
        .get(RETURN_URL)
        .await?
        .unwrap_or_else(|| dotenv::var("CLIENT_URL").unwrap_or_else(|_| "/".to_owned()));
    Ok(Redirect::to(return_url.as_str()))
}

async fn fetch_profile(
    provider: ClientProvider,
    http_client: &reqwest::Client,
    access_token: &str,
) -> AppResult<(String, String)> {
    let body: serde_json::Value = http_client
        .get(provider.userinfo_url())
        .bearer_auth(access_token)
        .header(reqwest::header::USER_AGENT, "swaptrade")
        .send()
        .await?
        .json()
        .await?;

    let email = match provider {
        ClientProvider::Google => body.get_str_field("email")?,
        // GitHub hides the email for some accounts
        ClientProvider::Github => body
            .get("email")
            .and_then(|e| e.as_str())
            .map(str::to_owned)
            .unwrap_or(format!("{}@users.noreply.github.com", body.get_str_field("login")?)),
    };
    let fullname = body
        .get("name")
        .and_then(|n| n.as_str())
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| email.split('@').next().unwrap_or("someone").to_owned());

    Ok((fullname, email))
}
