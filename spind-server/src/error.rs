//! Server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use spind_core::{ApiError, ErrorResponse};

/// Server errors, rendered as `{"error": CODE}` with the code's status.
#[derive(Debug)]
pub enum ServerError {
    Api(ApiError),
    Database(String),
    Internal(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api(e) => write!(f, "{}", e),
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

impl ServerError {
    /// The wire code sent to the client.
    pub fn api_error(&self) -> ApiError {
        match self {
            Self::Api(e) => *e,
            Self::Database(_) | Self::Internal(_) => ApiError::InternalServerError,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if !matches!(self, Self::Api(_)) {
            tracing::error!("{}", self);
        }

        let error = self.api_error();
        let status =
            StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(error))).into_response()
    }
}

impl From<ApiError> for ServerError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

impl From<rusqlite::Error> for ServerError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_code() {
        let response = ServerError::from(ApiError::VaultNotInitialized).into_response();
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

        let response = ServerError::from(ApiError::RevisionParameterMissing).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_database_errors_are_opaque() {
        let err = ServerError::Database("disk I/O error".to_string());
        assert_eq!(err.api_error(), ApiError::InternalServerError);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
