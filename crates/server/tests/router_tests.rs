//! Router-level behavior: health, fallbacks, body limits.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Part, TestServer, create_app, json_request, multipart_body, send, signup};

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;
    let (status, body) = json_request(&server.router, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unknown_path_envelope() {
    let server = TestServer::new().await;
    let (status, body) = json_request(&server.router, "GET", "/a/b/c/d/e", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "That address is not found on this server");
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_wrong_method_envelope() {
    let server = TestServer::new().await;
    let (status, body) = json_request(&server.router, "DELETE", "/me/apps", None, None).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "Method not allowed");
}

#[tokio::test]
async fn test_cors_preflight_allowed() {
    let server = TestServer::new().await;
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/account/new")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "POST")
        .body(Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(server.router.clone(), request)
        .await
        .unwrap();
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let server = TestServer::with_config(|config| config.server.max_upload_bytes = 1024).await;
    let keys = signup(&server.router, "big@example.com").await;
    create_app(&server.router, &keys.private, "big").await;

    let body = multipart_body(&[Part::File {
        field: "file_data",
        filename: "big.txt",
        data: &[b'x'; 4096],
    }]);
    let request = Request::builder()
        .method("POST")
        .uri("/big/upload")
        .header("X-Blober-ID", keys.private.as_str())
        .header("Content-Type", "multipart/form-data; boundary=blober-test-boundary")
        .header("Content-Length", body.len())
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let request = Request::builder()
        .method("POST")
        .uri("/big/upload")
        .header("X-Blober-ID", keys.private.as_str())
        .header("Content-Type", "multipart/form-data; boundary=x")
        .body(Body::from("--x--\r\n"))
        .unwrap();
    let (status, _) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
