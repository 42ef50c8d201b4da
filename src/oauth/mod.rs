//! Generic `OAuth2` account linking.
//!
//! Each platform supplies an [`OAuthClient`] (endpoints, scopes, credentials)
//! and a self-lookup through [`OAuthProvider`]. The authorization-code flow
//! itself is shared and lives in `routes::oauth`.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use oauth2::{basic::BasicClient, AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use serde::Deserialize;

use crate::{config::OAuthConfig, models::ExternalAccount};

pub mod discord;
pub mod github;

pub use discord::DiscordProvider;
pub use github::GitHubProvider;

/// Static description of a platform's `OAuth2` client.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Platform key, also the route segment (`/oauth/{platform}/...`).
    pub platform: &'static str,
    pub client_id: String,
    pub client_secret: String,
    pub authorization_endpoint: &'static str,
    pub scopes: &'static [&'static str],
    pub token_url: String,
}

/// A platform the user can link.
#[async_trait]
pub trait OAuthProvider: Send + Sync + fmt::Debug {
    fn client(&self) -> &OAuthClient;

    /// Look up the account owning `token`.
    ///
    /// Returns `None` when the platform does not answer with 200; no retry.
    async fn get_self(&self, http: &reqwest::Client, token: &str) -> Option<ExternalAccount>;
}

/// What the user is trying to do when starting the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    #[default]
    Login,
    Register,
    Link,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::Link => "link",
        }
    }
}

impl FromStr for Intent {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "register" => Ok(Self::Register),
            "link" => Ok(Self::Link),
            _ => Err(()),
        }
    }
}

/// Flow state remembered between the redirect and the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub platform: String,
    pub intent: Intent,
    pub state: String,
}

impl PendingAuthorization {
    /// Cookie encoding: `platform:intent:state`.
    pub fn encode(&self) -> String {
        format!("{}:{}:{}", self.platform, self.intent.as_str(), self.state)
    }

    pub fn decode(value: &str) -> Option<Self> {
        let mut parts = value.splitn(3, ':');
        let platform = parts.next()?.to_string();
        let intent = parts.next()?.parse().ok()?;
        let state = parts.next()?.to_string();
        Some(Self {
            platform,
            intent,
            state,
        })
    }

    /// True if the callback belongs to this pending flow.
    pub fn matches(&self, platform: &str, state: &str) -> bool {
        self.platform == platform && !state.is_empty() && self.state == state
    }
}

/// Build the provider's authorization URL with a fresh random state.
pub fn authorization_url(
    client: &OAuthClient,
    redirect_uri: &str,
) -> anyhow::Result<(String, String)> {
    let oauth = BasicClient::new(ClientId::new(client.client_id.clone()))
        .set_auth_uri(AuthUrl::new(client.authorization_endpoint.to_string())?)
        .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

    let (url, state) = oauth
        .authorize_url(CsrfToken::new_random)
        .add_scopes(client.scopes.iter().map(|s| Scope::new((*s).to_string())))
        .url();

    Ok((url.to_string(), state.secret().clone()))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchange an authorization code at the provider's token endpoint.
pub async fn exchange_code(
    http: &reqwest::Client,
    client: &OAuthClient,
    code: &str,
    redirect_uri: &str,
) -> anyhow::Result<String> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", client.client_id.as_str()),
        ("client_secret", client.client_secret.as_str()),
    ];

    let response = http
        .post(&client.token_url)
        .header("Accept", "application/json")
        .form(&params)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await?;
        tracing::error!(
            "{} token exchange failed: {} - {}",
            client.platform,
            status,
            error_text
        );
        anyhow::bail!("{} token exchange failed with status {status}", client.platform);
    }

    Ok(response.json::<TokenResponse>().await?.access_token)
}

/// Fetch a JSON document with a bearer token, `None` on any non-200 answer.
pub(crate) async fn fetch_self<T: serde::de::DeserializeOwned>(
    http: &reqwest::Client,
    platform: &str,
    url: &str,
    token: &str,
) -> Option<T> {
    let response = match http
        .get(url)
        .bearer_auth(token)
        .header("User-Agent", "PronounDB")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("{} self lookup failed: {}", platform, e);
            return None;
        }
    };

    if response.status() != reqwest::StatusCode::OK {
        tracing::warn!(
            "{} self lookup returned {}",
            platform,
            response.status()
        );
        return None;
    }

    response
        .json::<T>()
        .await
        .inspect_err(|e| tracing::warn!("{} self lookup returned bad JSON: {}", platform, e))
        .ok()
}

/// Providers keyed by platform.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    /// Register every platform that has credentials configured.
    pub fn from_config(config: &OAuthConfig) -> Self {
        let mut registry = Self::default();
        if let Some(creds) = &config.discord {
            registry.register(DiscordProvider::new(creds.clone()));
        }
        if let Some(creds) = &config.github {
            registry.register(GitHubProvider::new(creds.clone()));
        }
        registry
    }

    pub fn register(&mut self, provider: impl OAuthProvider + 'static) {
        let platform = provider.client().platform;
        tracing::debug!("Registered OAuth provider: {}", platform);
        self.providers.insert(platform, Arc::new(provider));
    }

    pub fn get(&self, platform: &str) -> Option<Arc<dyn OAuthProvider>> {
        self.providers.get(platform).cloned()
    }

    pub fn platforms(&self) -> Vec<&'static str> {
        let mut platforms: Vec<_> = self.providers.keys().copied().collect();
        platforms.sort_unstable();
        platforms
    }
}
