//! Decoration collection routes.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::api_method_not_allowed;
use crate::{error::ApiError, SharedState};

/// Routes:
/// - `GET /` - List decoration IDs
/// - `GET /{id}` - One decoration
pub fn decorations_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_decorations).fallback(api_method_not_allowed))
        .route("/{id}", get(get_decoration).fallback(api_method_not_allowed))
}

#[derive(Debug, Serialize)]
pub struct DecorationList {
    pub decorations: Vec<String>,
}

/// List every decoration ID in collection order.
pub async fn list_decorations(State(state): State<SharedState>) -> Json<DecorationList> {
    Json(DecorationList {
        decorations: state.decorations.ids(),
    })
}

pub async fn get_decoration(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Response {
    match state.decorations.get(&id) {
        Some(decoration) => Json(decoration.clone()).into_response(),
        None => ApiError::not_found().into_response(),
    }
}
