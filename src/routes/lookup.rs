//! Public pronoun lookup, queried by the browser extension.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::api_method_not_allowed;
use crate::{error::ApiError, models::Pronouns, SharedState};

/// Routes:
/// - `GET /lookup?platform=..&id=..`
pub fn lookup_router() -> Router<SharedState> {
    Router::new().route("/lookup", get(lookup).fallback(api_method_not_allowed))
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub platform: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LookupResponse {
    pub pronouns: Pronouns,
}

pub async fn lookup(State(state): State<SharedState>, Query(params): Query<LookupParams>) -> Response {
    let (Some(platform), Some(id)) = (params.platform, params.id) else {
        return ApiError::bad_request().into_response();
    };

    match state.storage.lookup_pronouns(&platform, &id).await {
        Ok(pronouns) => Json(LookupResponse { pronouns }).into_response(),
        Err(e) => e.into_response(),
    }
}
