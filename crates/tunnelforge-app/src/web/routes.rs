use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
    routing::{any, get},
    Router,
};
use bytes::Bytes;
use futures::Stream;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tunnelforge_types::BUFFERS_PATH;

use crate::config::GatewayConfig;
use crate::web::{
    backend::{normalize_json, BackendClient, BackendResponse},
    error::backend_error_body,
    events::EventHub,
    headers::{self, EVENT_STREAM_HEADERS},
    translate, GatewayError,
};

/// Application state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub backend: BackendClient,
    pub events: Arc<EventHub>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(config: GatewayConfig, events: Arc<EventHub>) -> Result<Self, GatewayError> {
        Ok(Self {
            backend: BackendClient::new(config.backend_url.clone())?,
            events,
            config: Arc::new(config),
        })
    }
}

/// Create router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/config", get(client_config))
        .route("/api/events", get(event_stream))
        .route("/api/control/stream", get(control_stream))
        // Session CRUD; methods without a translation are passed through
        .route(
            "/api/sessions",
            get(list_sessions).post(create_session).fallback(proxy_api),
        )
        .route("/api/sessions/:id", get(get_session).fallback(proxy_api))
        .route("/api/*rest", any(proxy_api))
        .route(BUFFERS_PATH, any(buffers_without_upgrade))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), redirect_upgrades))
        .layer(middleware::from_fn(headers::cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Middleware
// ============================================================================

fn is_backend_path(path: &str) -> bool {
    path.starts_with("/api/") || path == BUFFERS_PATH || path.starts_with("/buffers/")
}

/// The gateway never carries websocket traffic; upgrade requests are told
/// where to connect instead.
async fn redirect_upgrades(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let uri = request.uri();
    if headers::is_upgrade_request(request.headers()) && is_backend_path(uri.path()) {
        let direct = headers::direct_websocket_url(
            request.headers(),
            state.config.backend_ws_port,
            uri.path(),
            uri.query(),
        );
        info!(target: "gateway", path = uri.path(), direct = %direct, "redirecting websocket upgrade");
        return headers::upgrade_redirect(&direct);
    }
    next.run(request).await
}

// ============================================================================
// Local endpoints
// ============================================================================

/// GET /health
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "backend": state.backend.base_url().as_str(),
    }))
}

/// GET /api/config - Where the browser should open its buffer connection
async fn client_config(State(state): State<AppState>, request_headers: HeaderMap) -> Response {
    let tls = headers::is_forwarded_https(&request_headers);
    let host = headers::request_hostname(&request_headers);
    let ws_scheme = if tls { "wss" } else { "ws" };
    let http_scheme = if tls { "https" } else { "http" };
    let authority = request_headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let websocket_url = format!("{ws_scheme}://{host}:{}", state.config.backend_ws_port);

    let body = json!({
        "websocketUrl": websocket_url,
        "buffersUrl": format!("{websocket_url}{BUFFERS_PATH}"),
        "features": {
            "directWebSocket": true,
            "streamingEnabled": true,
        },
        "origin": format!("{http_scheme}://{authority}"),
    });

    let mut response = Json(body).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

/// GET /api/events
async fn event_stream(
    State(state): State<AppState>,
) -> (
    [(HeaderName, &'static str); 3],
    Sse<impl Stream<Item = Result<Event, Infallible>>>,
) {
    (EVENT_STREAM_HEADERS, Sse::new(state.events.events_stream()))
}

/// GET /api/control/stream
async fn control_stream(
    State(state): State<AppState>,
) -> (
    [(HeaderName, &'static str); 3],
    Sse<impl Stream<Item = Result<Event, Infallible>>>,
) {
    (EVENT_STREAM_HEADERS, Sse::new(state.events.control_stream()))
}

async fn buffers_without_upgrade() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "The buffer stream requires a websocket upgrade" })),
    )
        .into_response()
}

async fn not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("No route for {}", uri.path()), "status": 404 })),
    )
        .into_response()
}

// ============================================================================
// Session translation
// ============================================================================

fn path_and_query(uri: &Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}

/// GET /api/sessions - List sessions in client vocabulary
async fn list_sessions(
    State(state): State<AppState>,
    uri: Uri,
    request_headers: HeaderMap,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let response = state
        .backend
        .forward(Method::GET, path_and_query(&uri), &request_headers, Bytes::new())
        .await?
        .error_for_status()?;

    Ok(Json(translate::session_list_to_client(response.json()?)))
}

/// POST /api/sessions - Create a session
async fn create_session(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let request: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::Validation(format!("Invalid JSON body: {e}")))?;
    let payload = translate::create_request_to_backend(&request, &state.config.fallback_cwd)?;

    let response = state
        .backend
        .send_json(Method::POST, "/api/sessions", &request_headers, &payload)
        .await?
        .error_for_status()?;

    let created = translate::created_to_client(&response.json()?)?;
    info!(target: "gateway", session_id = %created["sessionId"], "session created");

    Ok((StatusCode::CREATED, Json(created)).into_response())
}

/// GET /api/sessions/:id
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    uri: Uri,
    request_headers: HeaderMap,
) -> Result<Json<serde_json::Value>, GatewayError> {
    debug!(target: "gateway", session_id = %id, "fetching session");
    let response = state
        .backend
        .forward(Method::GET, path_and_query(&uri), &request_headers, Bytes::new())
        .await?
        .error_for_status()?;

    Ok(Json(translate::session_to_client(response.json()?)))
}

// ============================================================================
// Generic pass-through
// ============================================================================

/// Any other /api/* request: forwarded with filtered headers, JSON bodies
/// normalized, error statuses given a JSON error body.
async fn proxy_api(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    request_headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let response = state
        .backend
        .forward(method, path_and_query(&uri), &request_headers, body)
        .await?;
    Ok(relay(response))
}

fn relay(response: BackendResponse) -> Response {
    let BackendResponse {
        status,
        headers: backend_headers,
        body,
    } = response;

    if !status.is_success() {
        return (status, Json(backend_error_body(status, &body))).into_response();
    }

    let is_json = !body.is_empty() && serde_json::from_slice::<serde_json::Value>(&body).is_ok();
    let body = if is_json { normalize_json(body) } else { body };

    let mut relayed = Response::new(Body::from(body));
    *relayed.status_mut() = status;
    *relayed.headers_mut() = headers::relayable_response_headers(&backend_headers);
    if is_json {
        relayed.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    relayed
}
