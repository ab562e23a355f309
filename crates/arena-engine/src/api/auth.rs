//! Shared-secret gate for mutating and admin routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use super::AppState;

const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests without the shared secret. Missing header is a 422,
/// a wrong key is a 401.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(provided) = request.headers().get(API_KEY_HEADER) else {
        return ApiError::MissingApiKey.into_response();
    };
    if provided.to_str().ok() != Some(state.api_key.as_str()) {
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}
