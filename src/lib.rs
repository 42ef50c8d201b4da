//! PronounDB
//!
//! Users sign in with a platform account (Discord, GitHub) over OAuth2, link
//! more accounts, and set their pronouns. The browser extension looks
//! pronouns up by platform account and renders them on third-party sites.
//!
//! # Features
//!
//! - `sqlx-storage` (default): PostgreSQL storage via SQLx
//! - `memory-storage`: In-memory storage for testing
//!
//! # Example
//!
//! ```rust,ignore
//! use pronoundb::{routes, AppState, Config, DecorationCollection, SqlxStorage};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     dotenvy::dotenv().ok();
//!     let config = Config::from_env()?;
//!     let pool = sqlx::PgPool::connect(&std::env::var("DATABASE_URL")?).await?;
//!     let storage = SqlxStorage::new(pool);
//!     storage.migrate().await?;
//!
//!     let decorations = DecorationCollection::load(&config.server.decorations_dir)?;
//!     let state = Arc::new(AppState::new(config, storage, decorations));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, routes::app(state)).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod decorations;
pub mod error;
pub mod extension;
pub mod flash;
pub mod models;
pub mod oauth;
pub mod routes;
pub mod storage;

use std::sync::Arc;

pub use config::{ClientCredentials, Config, ConfigError, OAuthConfig, SecurityConfig, ServerConfig};
pub use decorations::{Decoration, DecorationCollection, DecorationError};
pub use error::{ApiError, Error, Result, StorageError};
pub use models::{ExternalAccount, Pronouns, User};
pub use oauth::ProviderRegistry;
#[cfg(any(test, feature = "memory-storage"))]
pub use storage::MemoryStorage;
#[cfg(feature = "sqlx-storage")]
pub use storage::SqlxStorage;
pub use storage::UserStorage;

/// Application state shared by every handler.
///
/// Wrapped in `Arc` and handed to Axum's state extractor.
pub struct AppState {
    pub config: Config,
    pub storage: Box<dyn UserStorage>,
    /// HTTP client for provider token exchanges and self lookups.
    pub http_client: reqwest::Client,
    /// Loaded once at startup; the collection is static content.
    pub decorations: DecorationCollection,
    pub providers: ProviderRegistry,
}

impl AppState {
    /// Registers an OAuth provider for every platform with credentials in `config`.
    pub fn new(
        config: Config,
        storage: impl UserStorage + 'static,
        decorations: DecorationCollection,
    ) -> Self {
        Self::with_http_client(config, storage, decorations, reqwest::Client::new())
    }

    pub fn with_http_client(
        config: Config,
        storage: impl UserStorage + 'static,
        decorations: DecorationCollection,
        http_client: reqwest::Client,
    ) -> Self {
        let providers = ProviderRegistry::from_config(&config.oauth);
        Self {
            config,
            storage: Box::new(storage),
            http_client,
            decorations,
            providers,
        }
    }
}

pub type SharedState = Arc<AppState>;
