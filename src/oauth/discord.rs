//! Discord account linking.

use async_trait::async_trait;
use serde::Deserialize;

use super::{fetch_self, OAuthClient, OAuthProvider};
use crate::{config::ClientCredentials, models::ExternalAccount};

const SELF_URL: &str = "https://discord.com/api/v9/users/@me";

/// Discord `OAuth2` provider (`identify` scope).
#[derive(Debug, Clone)]
pub struct DiscordProvider {
    client: OAuthClient,
    self_url: String,
}

impl DiscordProvider {
    pub fn new(credentials: ClientCredentials) -> Self {
        Self {
            client: OAuthClient {
                platform: "discord",
                client_id: credentials.client_id,
                client_secret: credentials.client_secret,
                authorization_endpoint: "https://discord.com/oauth2/authorize",
                scopes: &["identify"],
                token_url: "https://discord.com/api/v9/oauth2/token".to_string(),
            },
            self_url: SELF_URL.to_string(),
        }
    }

    /// Point the token exchange and self lookup at another host.
    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        self_url: impl Into<String>,
    ) -> Self {
        self.client.token_url = token_url.into();
        self.self_url = self_url.into();
        self
    }
}

/// Discord user response from the /users/@me endpoint.
#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    discriminator: Option<String>,
}

impl From<DiscordUser> for ExternalAccount {
    fn from(user: DiscordUser) -> Self {
        // Accounts migrated to unique usernames report a "0" discriminator.
        let name = match user.discriminator.as_deref() {
            Some(tag) if tag != "0" => format!("{}#{}", user.username, tag),
            _ => user.username,
        };
        ExternalAccount::new("discord", user.id, name)
    }
}

#[async_trait]
impl OAuthProvider for DiscordProvider {
    fn client(&self) -> &OAuthClient {
        &self.client
    }

    async fn get_self(&self, http: &reqwest::Client, token: &str) -> Option<ExternalAccount> {
        fetch_self::<DiscordUser>(http, "discord", &self.self_url, token)
            .await
            .map(ExternalAccount::from)
    }
}
