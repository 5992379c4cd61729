//! Header hygiene for proxied traffic, CORS, and upgrade redirection.

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Request headers never forwarded to the backend.
pub const HOP_BY_HOP_REQUEST: &[&str] = &[
    "host",
    "connection",
    "upgrade",
    "sec-websocket-key",
    "sec-websocket-version",
    "sec-websocket-extensions",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "accept-encoding",
];

/// Response headers never relayed to the client.
pub const STRIPPED_RESPONSE: &[&str] = &[
    "content-encoding",
    "content-length",
    "transfer-encoding",
    "connection",
];

pub const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Requested-With";
pub const MAX_AGE_SECS: &str = "86400";

pub const DIRECT_URL_HEADER: &str = "x-websocket-direct-url";

fn filtered(headers: &HeaderMap, blocked: &[&str]) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !blocked.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

pub fn forwardable_request_headers(headers: &HeaderMap) -> HeaderMap {
    filtered(headers, HOP_BY_HOP_REQUEST)
}

pub fn relayable_response_headers(headers: &HeaderMap) -> HeaderMap {
    filtered(headers, STRIPPED_RESPONSE)
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

/// Answer preflights directly and stamp CORS headers on everything else.
pub async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        let headers = response.headers_mut();
        apply_cors(headers);
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors(response.headers_mut());
    response
}

pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers.contains_key(header::UPGRADE)
}

/// Host name from the `Host` header without its port. IPv6 literals keep
/// their brackets.
pub fn request_hostname(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");

    if host.starts_with('[') {
        if let Some(end) = host.find(']') {
            return host[..=end].to_string();
        }
    }
    host.split(':').next().unwrap_or(host).to_string()
}

/// True when a fronting proxy reports the client connected over TLS.
pub fn is_forwarded_https(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .map(|proto| proto.eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

/// Websocket URL a client should dial instead of upgrading through us.
pub fn direct_websocket_url(
    headers: &HeaderMap,
    backend_ws_port: u16,
    path: &str,
    query: Option<&str>,
) -> String {
    let scheme = if is_forwarded_https(headers) { "wss" } else { "ws" };
    let host = request_hostname(headers);
    match query {
        Some(query) if !query.is_empty() => {
            format!("{scheme}://{host}:{backend_ws_port}{path}?{query}")
        }
        _ => format!("{scheme}://{host}:{backend_ws_port}{path}"),
    }
}

/// 400 response pointing an upgrade request at the backend.
pub fn upgrade_redirect(direct_url: &str) -> Response {
    let body = serde_json::json!({
        "error": format!("WebSocket connections must connect directly to: {direct_url}"),
        "directUrl": direct_url,
    });

    let mut response = (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(direct_url) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(DIRECT_URL_HEADER), value);
    }
    response
}

/// Headers sent alongside [`axum::response::sse::Sse`] responses so that
/// intermediaries neither cache nor buffer the stream.
pub const EVENT_STREAM_HEADERS: [(HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache"),
    (header::CONNECTION, "keep-alive"),
    (HeaderName::from_static("x-accel-buffering"), "no"),
];
