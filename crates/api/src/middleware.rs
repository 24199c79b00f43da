use std::any::Any;

use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::Response,
};
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::errors::{json_body, json_error};

pub const UNAUTHORIZED_DETAIL: &str = "Authentication required";
pub const UNAUTHORIZED_MESSAGE: &str =
    "Valid authentication credentials are required to access this resource";

/// Bodies of 401 responses larger than this are not inspected.
const MAX_INSPECTED_BODY: usize = 64 * 1024;

/// The token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Rewrites every `401` into the uniform authentication error body.
///
/// A JSON `detail` set by the handler is kept; the `WWW-Authenticate`
/// challenge is always present.
pub async fn unauthorized_handler(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let response = next.run(req).await;
    if response.status() != StatusCode::UNAUTHORIZED {
        return response;
    }

    let (parts, body) = response.into_parts();
    let detail = to_bytes(body, MAX_INSPECTED_BODY)
        .await
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        .and_then(|value| value.get("detail")?.as_str().map(str::to_owned))
        .unwrap_or_else(|| UNAUTHORIZED_DETAIL.to_string());

    warn!(%method, path = %path, detail = %detail, "unauthorized request");

    let mut response = json_body(
        StatusCode::UNAUTHORIZED,
        json!({
            "detail": detail,
            "error": "UNAUTHORIZED",
            "message": UNAUTHORIZED_MESSAGE,
        }),
    );
    let headers = response.headers_mut();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            headers.append(name, value.clone());
        }
    }
    if !headers.contains_key(header::WWW_AUTHENTICATE) {
        headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

/// Turns a handler panic into a `500` instead of a dropped connection.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %message, "handler panicked");

    json_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({
            "status": "error",
            "detail": "Internal Server Error",
        }),
    )
}

pub async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "Not Found")
}
