//! REST API server module
//!
//! Exposes lookups, cached artifacts and service introspection over HTTP.

use crate::{Config, Resolver, Result};
use axum::{Router, http::HeaderValue, routing::get};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Lookup
/// - `GET /api/v1/lookup/:id` - Resolve an identifier, JSON metadata
/// - `GET /api/v1/lookup/:id/image` - Resolve an identifier, image bytes
///
/// ## Cache
/// - `GET /cache/:key` - Serve a cached artifact
///
/// ## System
/// - `GET /api/v1/health` - Health check
/// - `GET /api/v1/stats` - Lookup counters
/// - `GET /api/v1/events` - Server-sent events stream
/// - `GET /api/v1/openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
///
/// Anything else falls through to the static front-end directory when one is
/// configured, with `index.html` for unknown paths.
pub fn create_router(resolver: Arc<Resolver>, config: Arc<Config>) -> Router {
    let state = AppState::new(resolver, config.clone());

    let api = Router::new()
        // Lookup
        .route("/lookup/:id", get(routes::lookup))
        .route("/lookup/:id/image", get(routes::lookup_image))
        // System
        .route("/health", get(routes::health_check))
        .route("/stats", get(routes::get_stats))
        .route("/events", get(routes::event_stream))
        .route("/openapi.json", get(routes::openapi_spec));

    let router = Router::new()
        .nest("/api/v1", api)
        .route("/cache/:key", get(routes::get_cached));

    // SwaggerUi registers its own document route, so it must not reuse /api/v1/openapi.json
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    let router = match &config.server.api.static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => router,
    };

    let router = router.layer(TraceLayer::new_for_http());

    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Runs until `shutdown` completes, then stops accepting connections and
/// waits for in-flight requests to finish.
///
/// # Example
///
/// ```no_run
/// use avatar_resolver::{Config, Resolver};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let resolver = Arc::new(Resolver::new((*config).clone())?);
///
/// avatar_resolver::api::start_api_server(resolver, config, async {
///     tokio::signal::ctrl_c().await.ok();
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server<F>(
    resolver: Arc<Resolver>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(resolver, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().unwrap_or(bind_address),
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
