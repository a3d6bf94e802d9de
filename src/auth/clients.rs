use std::fmt;

use oauth2::{basic::BasicClient, AuthUrl, Client, ClientId, ClientSecret, RedirectUrl, Scope, TokenUrl};
use serde::Deserialize;
use serde_json::Value;

use crate::{AppError, AppResult, GetField};

type HappyClient = Client<oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>, oauth2::StandardTokenResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardTokenIntrospectionResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardRevocableToken, oauth2::StandardErrorResponse<oauth2::RevocationErrorResponseType>, oauth2::EndpointSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointSet>;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ClientProvider {
    Google,
    Github,
}

impl ClientProvider {
    pub(crate) fn scopes(&self) -> Vec<Scope> {
        use ClientProvider::*;
        let scopes: &[&str] = match self {
            Google => &["openid", "email", "profile"],
            Github => &["read:user", "user:email"],
        };
        scopes.iter().map(|s| Scope::new((*s).to_owned())).collect()
    }

    pub(crate) fn userinfo_url(&self) -> &'static str {
        use ClientProvider::*;
        match self {
            Google => "https://openidconnect.googleapis.com/v1/userinfo",
            Github => "https://api.github.com/user",
        }
    }
}

impl fmt::Display for ClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone)]
pub struct Clients {
    google_client: Option<HappyClient>,
    github_client: Option<HappyClient>,
}

impl Clients {
    /// Build the configured providers from the client-secret JSON. A missing
    /// provider block just disables that provider.
    pub fn from_json(json: Value, server_url: &str) -> AppResult<Clients> {
        let google_client = Self::provider_client(
            &json,
            "google",
            "https://accounts.google.com/o/oauth2/auth",
            "https://oauth2.googleapis.com/token",
            &format!("{server_url}/api/auth/lockin/google"),
        )?;
        let github_client = Self::provider_client(
            &json,
            "github",
            "https://github.com/login/oauth/authorize",
            "https://github.com/login/oauth/access_token",
            &format!("{server_url}/api/auth/lockin/github"),
        )?;

        Ok(Clients { google_client, github_client })
    }

    fn provider_client(
        json: &Value,
        key: &str,
        auth_url: &str,
        token_url: &str,
        redirect_url: &str,
    ) -> AppResult<Option<HappyClient>> {
        let Some(json) = json.get(key) else {
            return Ok(None);
        };
        let client_id = ClientId::new(json.get_str_field("client_id")?);
        let client_secret = ClientSecret::new(json.get_str_field("client_secret")?);

        let auth_url = AuthUrl::new(auth_url.to_owned())
            .map_err(|err| AppError::msg(format!("bad auth url: {err}")))?;
        let token_url = TokenUrl::new(token_url.to_owned())
            .map_err(|err| AppError::msg(format!("bad token url: {err}")))?;
        let redirect_url = RedirectUrl::new(redirect_url.to_owned())
            .map_err(|err| AppError::msg(format!("bad redirect url: {err}")))?;

        Ok(Some(
            BasicClient::new(client_id)
            .set_client_secret(client_secret)
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url)
        ))
    }

    pub fn get_client(&self, provider: ClientProvider) -> AppResult<HappyClient> {
        use ClientProvider::*;
        match provider {
            Google => self.google_client.clone(),
            Github => self.github_client.clone(),
        }
        .ok_or_else(|| AppError::msg(format!("OAuth provider {provider} keys not supplied")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_provider_block_disables_it() {
        let clients = Clients::from_json(
            json!({ "google": { "client_id": "id", "client_secret": "secret" } }),
            "http://localhost:5000",
        )
        .unwrap();

        assert!(clients.get_client(ClientProvider::Google).is_ok());
        assert!(clients.get_client(ClientProvider::Github).is_err());
    }
}
