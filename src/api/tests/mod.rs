use super::*;
use crate::resolver::test_helpers::{Reply, ScriptedFetcher, create_test_resolver};
use crate::types::FetchOutcome;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

const ID: &str = "15551234567";

fn app_with(
    sources: &[&str],
    recovery: bool,
    fetcher: ScriptedFetcher,
) -> (Router, Arc<Resolver>, tempfile::TempDir) {
    let (resolver, _fetcher, temp_dir) = create_test_resolver(sources, recovery, fetcher);
    let resolver = Arc::new(resolver);
    let config = resolver.config().clone();
    (create_router(resolver.clone(), config), resolver, temp_dir)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn raw_body(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn lookup_returns_cached_artifact_metadata() {
    let fetcher =
        ScriptedFetcher::default().image("https://a.example.com/15551234567", &[7u8; 2048]);
    let (app, _resolver, _temp_dir) = app_with(&["https://a.example.com/{id}"], false, fetcher);

    let response = app
        .oneshot(get("/api/v1/lookup/+1%20555%20123%204567"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["identifier"], ID);
    assert_eq!(body["cached"], true);
    assert_eq!(body["size"], "2.00 KB");
    assert_eq!(body["size_bytes"], 2048);
    assert_eq!(body["content_type"], "image/jpeg");
    assert_eq!(body["source"]["kind"], "source");
    assert_eq!(body["source"]["index"], 0);

    let filename = body["filename"].as_str().unwrap();
    assert_eq!(body["url"], format!("/cache/{filename}"));
}

#[tokio::test]
async fn cached_url_serves_the_bytes() {
    let fetcher = ScriptedFetcher::default().image("https://a.example.com/15551234567", b"jpeg!");
    let (app, _resolver, _temp_dir) = app_with(&["https://a.example.com/{id}"], false, fetcher);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/lookup/{ID}")))
        .await
        .unwrap();
    let url = json_body(response).await["url"].as_str().unwrap().to_string();

    let response = app.oneshot(get(&url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(raw_body(response).await, b"jpeg!");
}

#[tokio::test]
async fn cached_svg_keeps_its_content_type() {
    let fetcher = ScriptedFetcher::default().reply(
        "https://a.example.com/15551234567",
        Reply::Outcome(FetchOutcome::Success {
            bytes: b"<svg/>".to_vec(),
            content_type: "image/svg+xml".into(),
        }),
    );
    let (app, _resolver, _temp_dir) = app_with(&["https://a.example.com/{id}"], false, fetcher);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/lookup/{ID}")))
        .await
        .unwrap();
    let url = json_body(response).await["url"].as_str().unwrap().to_string();
    assert!(url.ends_with(".svg"), "{url}");

    let response = app.oneshot(get(&url)).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
    assert_eq!(raw_body(response).await, b"<svg/>");
}

#[tokio::test]
async fn short_identifier_is_bad_request() {
    let (app, resolver, _temp_dir) = app_with(
        &["https://a.example.com/{id}"],
        false,
        ScriptedFetcher::default(),
    );

    let response = app.oneshot(get("/api/v1/lookup/12345")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_identifier");
    assert_eq!(body["error"]["details"]["digits"], 5);
    assert_eq!(resolver.stats().invalid_identifiers, 1);
}

#[tokio::test]
async fn exhausted_sources_are_not_found() {
    let (app, _resolver, _temp_dir) = app_with(
        &["https://a.example.com/{id}"],
        false,
        ScriptedFetcher::default(),
    );

    let response = app.oneshot(get(&format!("/api/v1/lookup/{ID}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], "not_found");
}

#[tokio::test]
async fn recovered_reference_is_reported_and_redirected() {
    let fetcher = ScriptedFetcher::default().page(
        "https://page.example.com/15551234567",
        r#""previewable_image_url":"https://cdn.example.com/p/1.jpg""#,
    );
    let (app, _resolver, _temp_dir) = app_with(&["https://a.example.com/{id}"], true, fetcher);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/lookup/{ID}")))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["url"], "https://cdn.example.com/p/1.jpg");
    assert_eq!(body["cached"], false);
    assert_eq!(body["source"]["kind"], "recovery");
    assert!(body.get("filename").is_none());

    let response = app
        .oneshot(get(&format!("/api/v1/lookup/{ID}/image")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://cdn.example.com/p/1.jpg"
    );
}

#[tokio::test]
async fn image_endpoint_returns_attachment() {
    let fetcher = ScriptedFetcher::default().reply(
        "https://a.example.com/15551234567",
        Reply::Outcome(FetchOutcome::Success {
            bytes: b"RIFF....WEBP".to_vec(),
            content_type: "image/webp".into(),
        }),
    );
    let (app, _resolver, _temp_dir) = app_with(&["https://a.example.com/{id}"], false, fetcher);

    let response = app
        .oneshot(get("/api/v1/lookup/(555)%20123-4567/image"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"avatar-5551234567.webp\""
    );
    assert_eq!(raw_body(response).await, b"RIFF....WEBP");
}

#[tokio::test]
async fn unknown_cache_key_is_not_found() {
    let (app, _resolver, _temp_dir) = app_with(&[], false, ScriptedFetcher::default());

    for uri in ["/cache/avatar-1-2-3-abcd.jpg", "/cache/..%2Fsecret"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn health_and_stats() {
    let (app, resolver, _temp_dir) = app_with(
        &["https://a.example.com/{id}"],
        false,
        ScriptedFetcher::default(),
    );
    resolver.resolve("123").await.unwrap_err();

    let response = app.clone().oneshot(get("/api/v1/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sources"], 1);

    let response = app.oneshot(get("/api/v1/stats")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["lookups"], 1);
    assert_eq!(body["invalid_identifiers"], 1);
}

#[tokio::test]
async fn shutting_down_is_service_unavailable() {
    let (app, resolver, _temp_dir) = app_with(
        &["https://a.example.com/{id}"],
        false,
        ScriptedFetcher::default(),
    );
    resolver.shutdown();

    let response = app.oneshot(get(&format!("/api/v1/lookup/{ID}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _resolver, _temp_dir) = app_with(&[], false, ScriptedFetcher::default());

    let response = app.oneshot(get("/api/v1/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["paths"]["/api/v1/lookup/{id}"].is_object());
}

#[tokio::test]
async fn cors_headers_are_added() {
    let (app, _resolver, _temp_dir) = app_with(&[], false, ScriptedFetcher::default());

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn cors_can_be_restricted() {
    let (resolver, _fetcher, _temp_dir) =
        create_test_resolver(&[], false, ScriptedFetcher::default());
    let mut config = (**resolver.config()).clone();
    config.server.api.cors_origins = vec!["http://allowed.example".to_string()];
    let app = create_router(Arc::new(resolver), Arc::new(config));

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://allowed.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://allowed.example"
    );
}

#[tokio::test]
async fn static_dir_serves_front_end_with_index_fallback() {
    let (resolver, _fetcher, temp_dir) =
        create_test_resolver(&[], false, ScriptedFetcher::default());
    let public = temp_dir.path().join("public");
    std::fs::create_dir_all(&public).unwrap();
    std::fs::write(public.join("index.html"), "<h1>lookup</h1>").unwrap();
    std::fs::write(public.join("app.js"), "console.log(1)").unwrap();

    let mut config = (**resolver.config()).clone();
    config.server.api.static_dir = Some(public);
    let app = create_router(Arc::new(resolver), Arc::new(config));

    let response = app.clone().oneshot(get("/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(raw_body(response).await, b"console.log(1)");

    let response = app.oneshot(get("/some/client/route")).await.unwrap();
    assert_eq!(raw_body(response).await, b"<h1>lookup</h1>");
}

#[tokio::test]
async fn server_stops_on_shutdown_signal() {
    let (resolver, _fetcher, _temp_dir) =
        create_test_resolver(&[], false, ScriptedFetcher::default());
    let mut config = (**resolver.config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server(
        Arc::new(resolver),
        Arc::new(config),
        async move {
            rx.await.ok();
        },
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop")
        .unwrap();
    assert!(result.is_ok());
}
