//! Configuration types for the PronounDB service.

use std::path::PathBuf;

use serde::Deserialize;

/// Root configuration for the PronounDB service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// OAuth client credentials, one entry per configured platform.
    #[serde(default)]
    pub oauth: OAuthConfig,
    /// Security-related configuration.
    pub security: SecurityConfig,
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Client credentials for a single OAuth platform.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// OAuth configuration. A platform without credentials is not registered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub discord: Option<ClientCredentials>,
    #[serde(default)]
    pub github: Option<ClientCredentials>,
}

/// Security configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Secret key for session token signing.
    pub jwt_secret: String,
    /// Mark cookies `Secure`. Disable only for local development over plain HTTP.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL, used to build OAuth redirect URIs.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Directory holding the decoration collection.
    #[serde(default = "default_decorations_dir")]
    pub decorations_dir: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_decorations_dir() -> PathBuf {
    PathBuf::from("content/decorations")
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            decorations_dir: default_decorations_dir(),
        }
    }
}

impl ServerConfig {
    /// Redirect URI registered with a provider for the given platform.
    pub fn redirect_uri(&self, platform: &str) -> String {
        format!(
            "{}/oauth/{}/callback",
            self.public_url.trim_end_matches('/'),
            platform
        )
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Expected environment variables:
    /// - `JWT_SECRET`
    /// - `DISCORD_CLIENT_ID` / `DISCORD_CLIENT_SECRET` (optional pair)
    /// - `GITHUB_CLIENT_ID` / `GITHUB_CLIENT_SECRET` (optional pair)
    /// - `SECURE_COOKIES` (optional, defaults to true)
    /// - `HOST` (optional, defaults to "0.0.0.0")
    /// - `PORT` (optional, defaults to 3000)
    /// - `PUBLIC_URL` (optional, defaults to "http://localhost:3000")
    /// - `DECORATIONS_DIR` (optional, defaults to "content/decorations")
    pub fn from_env() -> Result<Self, ConfigError> {
        let oauth = OAuthConfig {
            discord: credentials_from_env("DISCORD_CLIENT_ID", "DISCORD_CLIENT_SECRET")?,
            github: credentials_from_env("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET")?,
        };

        let security = SecurityConfig {
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| ConfigError::MissingEnv("JWT_SECRET"))?,
            secure_cookies: std::env::var("SECURE_COOKIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_secure_cookies),
        };

        let server = ServerConfig {
            host: std::env::var("HOST").unwrap_or_else(|_| default_host()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_port),
            public_url: std::env::var("PUBLIC_URL").unwrap_or_else(|_| default_public_url()),
            decorations_dir: std::env::var("DECORATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_decorations_dir()),
        };

        Ok(Self {
            oauth,
            security,
            server,
        })
    }
}

/// Reads an optional id/secret pair. Setting only one half is an error.
fn credentials_from_env(
    id_var: &'static str,
    secret_var: &'static str,
) -> Result<Option<ClientCredentials>, ConfigError> {
    match (std::env::var(id_var).ok(), std::env::var(secret_var).ok()) {
        (Some(client_id), Some(client_secret)) => Ok(Some(ClientCredentials {
            client_id,
            client_secret,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::MissingEnv(secret_var)),
        (None, Some(_)) => Err(ConfigError::MissingEnv(id_var)),
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),
}
