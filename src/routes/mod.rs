//! HTTP route handlers.

pub mod account;
pub mod decorations;
pub mod lookup;
pub mod oauth;

use axum::{http::StatusCode, Router};
use tower_http::trace::TraceLayer;

pub use account::account_router;
pub use decorations::decorations_router;
pub use lookup::lookup_router;
pub use oauth::oauth_router;

use crate::{error::ApiError, SharedState};

/// Build the full application router.
///
/// Routes:
/// - `/api/decorations` - Decoration collection
/// - `/api/v1/lookup` - Pronoun lookup for the extension
/// - `/me` - Account page and its forms
/// - `/oauth/{platform}` - Account linking
pub fn app(state: SharedState) -> Router {
    Router::new()
        .nest("/api/decorations", decorations_router())
        .nest("/api/v1", lookup_router())
        .nest("/me", account_router())
        .nest("/oauth", oauth_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 405 for JSON API routes.
pub async fn api_method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

/// 405 for page routes.
pub async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "405: Method not allowed")
}
