//! Lookup handlers.

use super::{LookupResponse, format_kilobytes};
use crate::api::AppState;
use crate::cache::extension_for;
use crate::error::Error;
use crate::types::ArtifactLocation;
use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};

/// GET /lookup/:id - Resolve an identifier
#[utoipa::path(
    get,
    path = "/api/v1/lookup/{id}",
    tag = "lookup",
    params(
        ("id" = String, Path, description = "Raw identifier; non-digit characters are ignored")
    ),
    responses(
        (status = 200, description = "Artifact resolved", body = LookupResponse),
        (status = 400, description = "Too few digits", body = crate::error::ApiError),
        (status = 404, description = "No source produced an artifact", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn lookup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LookupResponse>, Error> {
    let resolution = state.resolver.resolve(&id).await?;
    let identifier = resolution.identifier;

    let response = match resolution.artifact {
        ArtifactLocation::Cached(entry) => LookupResponse {
            success: true,
            url: format!("/cache/{}", entry.key),
            size: Some(format_kilobytes(entry.size_bytes)),
            size_bytes: Some(entry.size_bytes),
            content_type: Some(entry.content_type),
            filename: Some(entry.key),
            identifier,
            source: resolution.source,
            cached: true,
        },
        ArtifactLocation::InMemory(artifact) => {
            let size = artifact.bytes.len() as u64;
            LookupResponse {
                success: true,
                url: format!("/api/v1/lookup/{}/image", identifier),
                filename: None,
                size: Some(format_kilobytes(size)),
                size_bytes: Some(size),
                content_type: Some(artifact.content_type),
                identifier,
                source: resolution.source,
                cached: false,
            }
        }
        ArtifactLocation::Reference(url) => LookupResponse {
            success: true,
            url: url.to_string(),
            filename: None,
            size: None,
            size_bytes: None,
            content_type: None,
            identifier,
            source: resolution.source,
            cached: false,
        },
    };

    Ok(Json(response))
}

/// GET /lookup/:id/image - Resolve an identifier and return the image itself
#[utoipa::path(
    get,
    path = "/api/v1/lookup/{id}/image",
    tag = "lookup",
    params(
        ("id" = String, Path, description = "Raw identifier; non-digit characters are ignored")
    ),
    responses(
        (status = 200, description = "Image bytes", content_type = "image/*"),
        (status = 307, description = "Redirect to an externally hosted image"),
        (status = 400, description = "Too few digits", body = crate::error::ApiError),
        (status = 404, description = "No source produced an artifact", body = crate::error::ApiError)
    )
)]
pub async fn lookup_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, Error> {
    let resolution = state.resolver.resolve(&id).await?;
    let identifier = resolution.identifier;

    let (bytes, content_type) = match resolution.artifact {
        ArtifactLocation::Cached(entry) => {
            // A sweep may have evicted the entry since it was written
            let stored = state
                .resolver
                .cache()
                .get(&entry.key)
                .await?
                .ok_or_else(|| Error::NotFound(identifier.to_string()))?;
            (stored.bytes, entry.content_type)
        }
        ArtifactLocation::InMemory(artifact) => (artifact.bytes, artifact.content_type),
        ArtifactLocation::Reference(url) => {
            return Ok(Redirect::temporary(url.as_str()).into_response());
        }
    };

    let disposition = format!(
        "attachment; filename=\"avatar-{}.{}\"",
        identifier,
        extension_for(&content_type)
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
