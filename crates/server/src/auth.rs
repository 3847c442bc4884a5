//! Access key transport and request tracing.
//!
//! A caller presents one of the two keys of their credential. The key is
//! looked up in the request header first, then the `bloberId` query
//! parameter, then the `X-Blober-ID` cookie; the first non-empty value wins.

use axum::extract::{FromRequestParts, Query, Request};
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;
use std::convert::Infallible;
use tracing::Instrument;
use uuid::Uuid;

/// Header and cookie name carrying the access key.
pub const KEY_HEADER: &str = "x-blober-id";
const KEY_COOKIE: &str = "X-Blober-ID";

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value, keeping printable
    /// ASCII only.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run the request inside a span carrying its trace ID.
pub async fn trace_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = req
        .headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_default();
    let span = tracing::info_span!("request", trace_id = %trace_id);
    req.extensions_mut().insert(trace_id);

    next.run(req).instrument(span).await
}

/// The access key presented with a request, if any.
///
/// Extraction never fails; whether the key is acceptable is decided by the
/// service when it resolves the caller.
#[derive(Clone, Default)]
pub struct BloberKey(pub Option<String>);

impl BloberKey {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl std::fmt::Debug for BloberKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.0.is_some() {
            "BloberKey(<redacted>)"
        } else {
            "BloberKey(None)"
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for BloberKey {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(extract_key(parts)))
    }
}

#[derive(Deserialize)]
struct KeyQuery {
    #[serde(rename = "bloberId")]
    blober_id: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Find the access key in header, query string or cookie, in that order.
pub fn extract_key(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(non_empty);
    if from_header.is_some() {
        return from_header;
    }

    let from_query = Query::<KeyQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.blober_id)
        .and_then(|v| non_empty(&v));
    if from_query.is_some() {
        return from_query;
    }

    cookie_value(&parts.headers, KEY_COOKIE)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| k.trim() == name)
        .and_then(|(_, v)| non_empty(v.trim_matches('"')))
}
