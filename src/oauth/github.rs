//! GitHub account linking.

use async_trait::async_trait;
use serde::Deserialize;

use super::{fetch_self, OAuthClient, OAuthProvider};
use crate::{config::ClientCredentials, models::ExternalAccount};

const SELF_URL: &str = "https://api.github.com/user";

/// GitHub `OAuth2` provider. No scope is needed to read the public profile.
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    client: OAuthClient,
    self_url: String,
}

impl GitHubProvider {
    pub fn new(credentials: ClientCredentials) -> Self {
        Self {
            client: OAuthClient {
                platform: "github",
                client_id: credentials.client_id,
                client_secret: credentials.client_secret,
                authorization_endpoint: "https://github.com/login/oauth/authorize",
                scopes: &[],
                token_url: "https://github.com/login/oauth/access_token".to_string(),
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

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
}

impl From<GitHubUser> for ExternalAccount {
    fn from(user: GitHubUser) -> Self {
        ExternalAccount::new("github", user.id.to_string(), user.login)
    }
}

#[async_trait]
impl OAuthProvider for GitHubProvider {
    fn client(&self) -> &OAuthClient {
        &self.client
    }

    async fn get_self(&self, http: &reqwest::Client, token: &str) -> Option<ExternalAccount> {
        fetch_self::<GitHubUser>(http, "github", &self.self_url, token)
            .await
            .map(ExternalAccount::from)
    }
}
