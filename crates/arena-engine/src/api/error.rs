//! API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::store::StoreError;

/// Errors surfaced to API clients.
#[derive(Debug)]
pub enum ApiError {
    /// 404 with the missing entity in the detail.
    NotFound(String),
    /// 400 with a human-readable detail.
    BadRequest(String),
    /// 422: the shared secret header is absent.
    MissingApiKey,
    /// 401: the shared secret header is wrong.
    Unauthorized,
    /// 500.
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::MissingApiKey => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Missing X-API-Key header".to_string(),
            ),
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Invalid API key".to_string())
            }
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::MissingApiKey.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
