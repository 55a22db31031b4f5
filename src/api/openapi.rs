//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time with utoipa.

use utoipa::OpenApi;

/// OpenAPI documentation for the avatar-resolver REST API
///
/// Served at `/api/v1/openapi.json`; Swagger UI (when enabled) is at
/// `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "avatar-resolver REST API",
        version = "0.1.0",
        description = "Resolve an identifier to an image by probing an ordered list of sources",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    paths(
        // Lookup
        crate::api::routes::lookup,
        crate::api::routes::lookup_image,

        // Cache
        crate::api::routes::get_cached,

        // System
        crate::api::routes::health_check,
        crate::api::routes::get_stats,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::identifier::Identifier,
        crate::types::SourceRef,
        crate::types::SoftFailureKind,
        crate::types::Event,
        crate::types::StatsSnapshot,
        crate::cache::CacheEntry,
        crate::source::SourceDescriptor,
        crate::config::Config,
        crate::config::FetchConfig,
        crate::config::RecoveryConfig,
        crate::config::CacheConfig,
        crate::config::ServerIntegrationConfig,
        crate::config::ApiConfig,
        crate::api::routes::LookupResponse,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "lookup", description = "Resolve identifiers to images"),
        (name = "cache", description = "Serve previously resolved images by cache key"),
        (name = "system", description = "Health, counters, events and the OpenAPI document"),
    )
)]
pub struct ApiDoc;
