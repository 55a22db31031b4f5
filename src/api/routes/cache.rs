//! Cached artifact handler.

use crate::api::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

/// GET /cache/:key - Serve a cached artifact
///
/// Unknown, expired and malformed keys are all plain misses.
#[utoipa::path(
    get,
    path = "/cache/{key}",
    tag = "cache",
    params(
        ("key" = String, Path, description = "Cache key returned by a lookup")
    ),
    responses(
        (status = 200, description = "Cached image bytes", content_type = "image/*"),
        (status = 404, description = "No such entry", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn get_cached(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.resolver.cache().get(&key).await {
        Ok(Some(artifact)) => (
            [
                (header::CONTENT_TYPE, artifact.content_type),
                (header::CACHE_CONTROL, "no-cache".to_string()),
            ],
            artifact.bytes,
        )
            .into_response(),
        Ok(None) => ApiError::not_found("cache entry").into_response(),
        Err(e) => {
            tracing::error!(key = %key, error = %e, "failed to read cache entry");
            e.into_response()
        }
    }
}
