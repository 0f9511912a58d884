use crate::RequestRejection;
use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";
pub const CACHE_CONTROL_PUBLIC_DAY: &str = "public, max-age=86400";

/// Headers that describe a single connection and must not be relayed
/// between the inbound request and a collaborator (in either direction).
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// A fully materialised reply, independent of the HTTP server.
#[derive(Debug, Clone)]
pub struct ImageResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ImageResponse {
    /// Freshly served JPEG: `200`, `image/jpeg`, publicly cacheable for 24h.
    pub fn jpeg(body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JPEG_CONTENT_TYPE));
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_PUBLIC_DAY),
        );

        Self {
            status: StatusCode::OK,
            headers,
            body: body.into(),
        }
    }

    pub fn text(status: StatusCode, message: impl Into<String>) -> Self {
        let message: String = message.into();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain;charset=UTF-8"),
        );

        Self {
            status,
            headers,
            body: Bytes::from(message),
        }
    }

    /// Relay an upstream reply as-is, minus connection-level headers.
    pub fn passthrough(status: StatusCode, upstream: &HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers: strip_hop_by_hop(upstream),
            body,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

impl From<RequestRejection> for ImageResponse {
    fn from(rejection: RequestRejection) -> Self {
        Self::text(rejection.status(), rejection.to_string())
    }
}

impl IntoResponse for ImageResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// `404` and `204` are ordinary cache misses, not failures worth logging.
pub fn is_miss_status(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT
}
