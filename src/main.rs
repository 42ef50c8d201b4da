use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use pronoundb::{routes, AppState, Config, DecorationCollection, UserStorage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(not(any(feature = "sqlx-storage", feature = "memory-storage")))]
compile_error!("enable either the `sqlx-storage` or the `memory-storage` feature");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pronoundb=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let decorations = DecorationCollection::load(&config.server.decorations_dir)?;
    tracing::info!("Loaded {} decorations", decorations.len());

    let storage = storage().await?;

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("invalid HOST {:?}", config.server.host))?,
        config.server.port,
    );

    let state = Arc::new(AppState::new(config, storage, decorations));
    tracing::info!("OAuth platforms: {:?}", state.providers.platforms());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, routes::app(state)).await?;

    Ok(())
}

#[cfg(feature = "sqlx-storage")]
async fn storage() -> anyhow::Result<impl UserStorage> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = sqlx::PgPool::connect(&url).await?;
    let storage = pronoundb::SqlxStorage::new(pool);
    storage.migrate().await?;
    tracing::info!("Database connected");
    Ok(storage)
}

#[cfg(all(feature = "memory-storage", not(feature = "sqlx-storage")))]
async fn storage() -> anyhow::Result<impl UserStorage> {
    tracing::warn!("Using in-memory storage, data is lost on exit");
    Ok(pronoundb::MemoryStorage::new())
}
