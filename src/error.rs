//! Error types for the PronounDB service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for PronounDB operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// OAuth provider request failed.
    #[error("oauth provider error: {0}")]
    Upstream(String),

    /// JWT token operation failed.
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// User not found.
    #[error("user not found: {0}")]
    UserNotFound(uuid::Uuid),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown resource.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Storage-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database query failed.
    #[cfg(feature = "sqlx-storage")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The external account is already linked to another user.
    #[error("account {platform}:{id} is already linked")]
    AccountTaken { platform: String, id: String },

    /// Generic storage error for non-sqlx backends.
    #[error("storage error: {0}")]
    Other(String),
}

/// JSON error body shared by the API routes.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub status_code: u16,
    pub error: &'static str,
}

impl ApiError {
    pub fn method_not_allowed() -> Self {
        Self {
            status_code: 405,
            error: "Method not allowed",
        }
    }

    pub fn not_found() -> Self {
        Self {
            status_code: 404,
            error: "Not found",
        }
    }

    pub fn bad_request() -> Self {
        Self {
            status_code: 400,
            error: "Bad request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::Storage(StorageError::AccountTaken { .. }) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            Error::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            Error::Upstream(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            Error::Jwt(_) => (StatusCode::UNAUTHORIZED, "401: Unauthorized".to_string()),
            Error::UserNotFound(_) | Error::AuthFailed(_) => {
                (StatusCode::UNAUTHORIZED, "401: Unauthorized".to_string())
            }
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "400: Bad request".to_string()),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "404: Not found".to_string()),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", message);
        }

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = uuid::Uuid::nil();
        let err = Error::UserNotFound(id);
        assert_eq!(
            err.to_string(),
            "user not found: 00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Other("test error".to_string());
        assert_eq!(err.to_string(), "storage error: test error");

        let err = StorageError::AccountTaken {
            platform: "discord".to_string(),
            id: "42".to_string(),
        };
        assert_eq!(err.to_string(), "account discord:42 is already linked");
    }

    #[test]
    fn test_error_from_storage_error() {
        let storage_err = StorageError::Other("test".to_string());
        let err: Error = storage_err.into();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_auth_failure_maps_to_401() {
        let response = Error::AuthFailed("no session".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_api_error_body() {
        let json = serde_json::to_string(&ApiError::method_not_allowed()).unwrap();
        assert_eq!(json, r#"{"statusCode":405,"error":"Method not allowed"}"#);
    }
}
