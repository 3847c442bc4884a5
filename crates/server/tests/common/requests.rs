//! Request helpers driving the router in-process.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "blober-test-boundary";

/// Helper to make JSON requests.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    key: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(key) = key {
        builder = builder.header("X-Blober-ID", key);
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    send(router, builder.body(body).unwrap()).await
}

/// Send a prepared request and decode the JSON envelope.
#[allow(dead_code)]
pub async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, bytes) = send_raw(router, request).await;
    let json: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Send a request and return status, headers and raw body.
#[allow(dead_code)]
pub async fn send_raw(
    router: &axum::Router,
    request: Request<Body>,
) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, bytes)
}

/// One part of a multipart form.
#[allow(dead_code)]
pub enum Part<'a> {
    File {
        field: &'a str,
        filename: &'a str,
        data: &'a [u8],
    },
    Text {
        field: &'a str,
        value: &'a str,
    },
}

/// Encode a `multipart/form-data` body.
#[allow(dead_code)]
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                field,
                filename,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { field, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POST a multipart form.
#[allow(dead_code)]
pub async fn multipart_request(
    router: &axum::Router,
    uri: &str,
    parts: &[Part<'_>],
    key: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(key) = key {
        builder = builder.header("X-Blober-ID", key);
    }
    send(router, builder.body(Body::from(multipart_body(parts))).unwrap()).await
}

/// Both keys of a freshly created account.
#[allow(dead_code)]
pub struct Keys {
    pub account_id: i64,
    pub private: String,
    pub public: String,
}

/// Sign up `email` and return its keys.
#[allow(dead_code)]
pub async fn signup(router: &axum::Router, email: &str) -> Keys {
    let (status, body) = json_request(
        router,
        "POST",
        "/account/new",
        Some(json!({
            "first_name": "Test",
            "last_name": "User",
            "email": email,
            "password": "correct-horse"
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");

    let credential = &body["data"]["credential"];
    Keys {
        account_id: body["data"]["id"].as_i64().unwrap(),
        private: credential["private_access_key"].as_str().unwrap().to_string(),
        public: credential["public_access_key"].as_str().unwrap().to_string(),
    }
}

/// Create an app and return its JSON record.
#[allow(dead_code)]
pub async fn create_app(router: &axum::Router, key: &str, name: &str) -> Value {
    let (status, body) = json_request(
        router,
        "POST",
        "/app/new",
        Some(json!({ "name": name })),
        Some(key),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "app creation failed: {body}");
    body["data"].clone()
}

/// Upload one file through `/{app}/upload`.
#[allow(dead_code)]
pub async fn upload(
    router: &axum::Router,
    key: &str,
    app: &str,
    filename: &str,
    data: &[u8],
    private: bool,
) -> (StatusCode, Value) {
    let private = if private { "true" } else { "false" };
    multipart_request(
        router,
        &format!("/{app}/upload"),
        &[
            Part::File {
                field: "file_data",
                filename,
                data,
            },
            Part::Text {
                field: "private",
                value: private,
            },
        ],
        Some(key),
    )
    .await
}

/// GET a blob, optionally with a key in the header.
#[allow(dead_code)]
pub async fn download(
    router: &axum::Router,
    uri: &str,
    key: Option<&str>,
) -> (StatusCode, HeaderMap, Bytes) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(key) = key {
        builder = builder.header("X-Blober-ID", key);
    }
    send_raw(router, builder.body(Body::empty()).unwrap()).await
}
