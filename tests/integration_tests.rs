//! Integration tests for the release-proxy server
//!
//! These drive the router in-process with `tower::ServiceExt::oneshot`. A
//! single wiremock server plays both upstreams: the release listing API
//! under `/repos/...` and the asset host under `/acme/...`. The streaming
//! tests swap the asset host for a raw TCP listener that controls exactly
//! when body bytes are written.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures_util::StreamExt;
use release_proxy::config::Config;
use release_proxy::server::{router, AppState};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWNER: &str = "acme";

// =============================================================================
// Helpers
// =============================================================================

async fn setup() -> (MockServer, Router) {
    let upstream = MockServer::start().await;
    let config = Config::new(OWNER)
        .with_api_url(upstream.uri())
        .with_download_url(upstream.uri());
    let app = router(Arc::new(AppState::new(config).unwrap()));
    (upstream, app)
}

async fn mount_releases(upstream: &MockServer, repo: &str, tags: &[&str]) {
    let body: Vec<_> = tags.iter().map(|t| json!({ "tag_name": t })).collect();
    Mock::given(method("GET"))
        .and(path(format!("/repos/{OWNER}/{repo}/releases")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(upstream)
        .await;
}

async fn mount_asset(upstream: &MockServer, asset_path: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(asset_path))
        .respond_with(template)
        .expect(1)
        .mount(upstream)
        .await;
}

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

// =============================================================================
// Latest Version Tests
// =============================================================================

#[tokio::test]
async fn test_latest_version_txt() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v2.0.0", "v1.0.0"]).await;

    let response = get(app, "/foo/latest/version.txt").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, "backend-url").is_none());
    assert_eq!(body_text(response).await, "2.0.0\n");
}

#[tokio::test]
async fn test_latest_version_txt_without_releases() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &[]).await;

    let response = get(app, "/foo/latest/version.txt").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "Not found\n");
}

#[tokio::test]
async fn test_listing_failure_is_bad_gateway() {
    let (upstream, app) = setup().await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/{OWNER}/foo/releases")))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
        )
        .mount(&upstream)
        .await;

    let response = get(app, "/foo/latest/version.txt").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(body_text(response).await.contains("Bad credentials"));
}

#[tokio::test]
async fn test_listing_failure_on_asset_route() {
    let (upstream, app) = setup().await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/{OWNER}/foo/releases")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;

    let response = get(app, "/foo/v1.0.0.zip").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(header(&response, "version").is_none());
}

// =============================================================================
// Generic Asset Tests
// =============================================================================

#[tokio::test]
async fn test_generic_asset_for_explicit_tag() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v2.0.0", "v1.0.0", "v0.9.0"]).await;
    mount_asset(
        &upstream,
        "/acme/foo/releases/download/v1.0.0/foo_1.0.0.zip",
        ResponseTemplate::new(200).set_body_bytes(b"PK-archive".to_vec()),
    )
    .await;

    let response = get(app, "/foo/v1.0.0.zip").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "version"), Some("v1.0.0"));
    assert_eq!(
        header(&response, "backend-url").map(str::to_string),
        Some(format!(
            "{}/acme/foo/releases/download/v1.0.0/foo_1.0.0.zip",
            upstream.uri()
        ))
    );
    assert!(header(&response, "platform").is_none());
    assert_eq!(body_bytes(response).await, b"PK-archive");
}

#[tokio::test]
async fn test_generic_asset_for_latest_with_compound_extension() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v2.0.0", "v1.0.0"]).await;
    mount_asset(
        &upstream,
        "/acme/foo/releases/download/v2.0.0/foo_2.0.0.tar.gz",
        ResponseTemplate::new(200).set_body_bytes(b"gz".to_vec()),
    )
    .await;

    let response = get(app, "/foo/latest.tar.gz").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "version"), Some("v2.0.0"));
    assert_eq!(body_bytes(response).await, b"gz");
}

#[tokio::test]
async fn test_unmarked_tag_is_used_verbatim() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["1.2.3"]).await;
    mount_asset(
        &upstream,
        "/acme/foo/releases/download/1.2.3/foo_1.2.3.deb",
        ResponseTemplate::new(200),
    )
    .await;

    let response = get(app, "/foo/1.2.3.deb").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "version"), Some("1.2.3"));
}

#[tokio::test]
async fn test_upstream_not_found_is_forwarded() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v1.0.0"]).await;
    mount_asset(
        &upstream,
        "/acme/foo/releases/download/v1.0.0/foo_1.0.0.zip",
        ResponseTemplate::new(404).set_body_string("upstream says no"),
    )
    .await;

    let response = get(app, "/foo/v1.0.0.zip").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(header(&response, "version"), Some("v1.0.0"));
    assert!(header(&response, "backend-url").is_some());
    assert_eq!(body_text(response).await, "upstream says no");
}

#[tokio::test]
async fn test_upstream_server_error_is_forwarded() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v1.0.0"]).await;
    mount_asset(
        &upstream,
        "/acme/foo/releases/download/v1.0.0/foo_1.0.0.zip",
        ResponseTemplate::new(503),
    )
    .await;

    let response = get(app, "/foo/v1.0.0.zip").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unresolved_tag_never_fetches() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v2.0.0", "v1.0.0"]).await;
    Mock::given(method("GET"))
        .and(path("/acme/foo/releases/download/1.0.0/foo_1.0.0.zip"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    // Exact match only: `1.0.0` is not `v1.0.0`.
    let response = get(app, "/foo/1.0.0.zip").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(header(&response, "version").is_none());
    assert_eq!(body_text(response).await, "Not found\n");
}

#[tokio::test]
async fn test_latest_without_releases_is_not_found() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &[]).await;

    let response = get(app, "/foo/latest.zip").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fetch_transport_failure_is_bad_gateway() {
    let upstream = MockServer::start().await;
    mount_releases(&upstream, "foo", &["v1.0.0"]).await;
    let config = Config::new(OWNER)
        .with_api_url(upstream.uri())
        .with_download_url("http://127.0.0.1:1");
    let app = router(Arc::new(AppState::new(config).unwrap()));

    let response = get(app, "/foo/v1.0.0.zip").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(header(&response, "backend-url").is_none());
}

#[tokio::test]
async fn test_reserved_characters_in_tag_stay_in_path() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v1.0#rc"]).await;
    mount_asset(
        &upstream,
        "/acme/foo/releases/download/v1.0%23rc/foo_1.0%23rc.zip",
        ResponseTemplate::new(200).set_body_bytes(b"rc".to_vec()),
    )
    .await;

    let response = get(app, "/foo/v1.0%23rc.zip").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "version"), Some("v1.0#rc"));
    assert_eq!(
        header(&response, "backend-url").map(str::to_string),
        Some(format!(
            "{}/acme/foo/releases/download/v1.0%23rc/foo_1.0%23rc.zip",
            upstream.uri()
        ))
    );
    assert_eq!(body_bytes(response).await, b"rc");
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v1.0.0"]).await;
    mount_asset(
        &upstream,
        "/acme/foo/releases/download/v1.0.0/foo_1.0.0.zip",
        ResponseTemplate::new(302)
            .insert_header("location", format!("{}/objects/blob", upstream.uri()).as_str()),
    )
    .await;
    mount_asset(
        &upstream,
        "/objects/blob",
        ResponseTemplate::new(200).set_body_bytes(b"blob".to_vec()),
    )
    .await;

    let response = get(app, "/foo/v1.0.0.zip").await;

    assert_eq!(response.status(), StatusCode::OK);
    let backend = header(&response, "backend-url").unwrap().to_string();
    assert!(backend.ends_with("/releases/download/v1.0.0/foo_1.0.0.zip"));
    assert_eq!(body_bytes(response).await, b"blob");
}

// =============================================================================
// Platform Asset Tests
// =============================================================================

#[tokio::test]
async fn test_platform_asset() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v1.2.3"]).await;
    mount_asset(
        &upstream,
        "/acme/foo/releases/download/v1.2.3/foo_1.2.3_darwin_arm64.tar.gz",
        ResponseTemplate::new(200).set_body_bytes(b"mac".to_vec()),
    )
    .await;

    let response = get(app, "/foo/v1.2.3/Darwin_ARM64.tar.gz").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "version"), Some("v1.2.3"));
    assert_eq!(header(&response, "platform"), Some("Darwin_ARM64"));
    assert!(header(&response, "backend-url")
        .unwrap()
        .ends_with("/acme/foo/releases/download/v1.2.3/foo_1.2.3_darwin_arm64.tar.gz"));
    assert_eq!(body_bytes(response).await, b"mac");
}

#[tokio::test]
async fn test_platform_asset_for_latest() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v3.1.0", "v3.0.0"]).await;
    mount_asset(
        &upstream,
        "/acme/foo/releases/download/v3.1.0/foo_3.1.0_linux_amd64.zip",
        ResponseTemplate::new(200),
    )
    .await;

    let response = get(app, "/foo/latest/linux_amd64.zip").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "version"), Some("v3.1.0"));
}

#[tokio::test]
async fn test_malformed_platform_is_not_found_without_listing() {
    let (upstream, app) = setup().await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/{OWNER}/foo/releases")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "tag_name": "v1.0.0" }])))
        .expect(0)
        .mount(&upstream)
        .await;

    let response = get(app, "/foo/v1.0.0/linux.tar.gz").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "Not found\n");
}

#[tokio::test]
async fn test_platform_unresolved_tag() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v1.0.0"]).await;

    let response = get(app, "/foo/v9.9.9/linux_amd64.tar.gz").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(header(&response, "platform").is_none());
}

// =============================================================================
// Streaming Tests
// =============================================================================

#[tokio::test]
async fn test_large_body_streams_intact() {
    let (upstream, app) = setup().await;
    mount_releases(&upstream, "foo", &["v1.0.0"]).await;

    let payload: Vec<u8> = (0..8 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    mount_asset(
        &upstream,
        "/acme/foo/releases/download/v1.0.0/foo_1.0.0.bin",
        ResponseTemplate::new(200).set_body_bytes(payload.clone()),
    )
    .await;

    let response = get(app, "/foo/v1.0.0.bin").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "content-length"),
        Some(payload.len().to_string().as_str())
    );
    let body = body_bytes(response).await;
    assert_eq!(body.len(), payload.len());
    assert!(body == payload);
}

/// Upstream that sends headers and a first chunk of a much longer body, then
/// stalls. Reports on `closed` once the proxy hangs up.
async fn stalling_upstream(first_chunk: &'static [u8]) -> (String, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "proxy closed before sending a full request");
            request.extend_from_slice(&buf[..n]);
        }

        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1048576\r\n\r\n")
            .await
            .unwrap();
        socket.write_all(first_chunk).await.unwrap();
        socket.flush().await.unwrap();

        // Never send the rest; wait for the proxy to drop the connection.
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = closed_tx.send(());
    });

    (format!("http://{}", addr), closed_rx)
}

#[tokio::test]
async fn test_body_streams_before_upstream_finishes() {
    let api = MockServer::start().await;
    mount_releases(&api, "foo", &["v1.0.0"]).await;
    let (download_url, closed) = stalling_upstream(b"first-chunk").await;
    let config = Config::new(OWNER)
        .with_api_url(api.uri())
        .with_download_url(download_url.as_str());
    let app = router(Arc::new(AppState::new(config).unwrap()));

    // Headers arrive while upstream still owes most of the body.
    let response = timeout(Duration::from_secs(5), get(app, "/foo/v1.0.0.bin"))
        .await
        .expect("response headers should not wait for the full body");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "backend-url").map(str::to_string),
        Some(format!(
            "{}/acme/foo/releases/download/v1.0.0/foo_1.0.0.bin",
            download_url
        ))
    );
    assert_eq!(header(&response, "content-length"), Some("1048576"));

    let mut body = response.into_body().into_data_stream();
    let mut received = Vec::new();
    while received.len() < b"first-chunk".len() {
        let chunk = timeout(Duration::from_secs(5), body.next())
            .await
            .expect("first chunk should be relayed before upstream finishes")
            .expect("body ended early")
            .unwrap();
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, b"first-chunk");

    // Client hangs up mid-transfer: the upstream connection must be released.
    drop(body);
    timeout(Duration::from_secs(5), closed)
        .await
        .expect("upstream connection should close after the client drops the body")
        .unwrap();
}

// =============================================================================
// Routing Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (_upstream, app) = setup().await;

    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["owner"], OWNER);
}

#[tokio::test]
async fn test_file_without_extension_is_not_found() {
    let (_upstream, app) = setup().await;

    let response = get(app, "/foo/v1").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_repo_name_is_not_found() {
    let (_upstream, app) = setup().await;

    let response = get(app, "/foo%3Fbar/v1.0.0.zip").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
