use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use flate2::{write::GzEncoder, Compression};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use tunnelforge::{create_router, AppState, EventHub, GatewayConfig};
use url::Url;
use wiremock::matchers::{body_json, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(backend_url: &str) -> Router {
    let url = Url::parse(backend_url).unwrap();
    let mut config = GatewayConfig::new("127.0.0.1:3001".parse().unwrap(), url);
    config.fallback_cwd = "/home/tester".to_string();
    config.backend_ws_port = 4021;
    let events = Arc::new(EventHub::new(config.event_streams.clone()));
    create_router(AppState::new(config, events).unwrap())
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn gzip(value: &Value) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(value.to_string().as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// A URL nothing is listening on.
fn dead_backend() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

#[tokio::test]
async fn create_translates_request_and_returns_201() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sessions"))
        .and(body_json(json!({
            "command": "npm run dev",
            "cwd": "/app",
            "title": "dev",
            "cols": 80,
            "rows": 24
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sess-1",
            "title": "dev",
            "command": "npm run dev"
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let (status, _, body) = send(
        gateway_for(&backend.uri()),
        json_request(
            Method::POST,
            "/api/sessions",
            json!({"command": ["npm", "run", "dev"], "workingDir": "/app", "name": "dev"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({"sessionId": "sess-1", "message": "Session created successfully"})
    );
}

#[tokio::test]
async fn create_without_command_never_reaches_backend() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let (status, _, body) = send(
        gateway_for(&backend.uri()),
        json_request(Method::POST, "/api/sessions", json!({"command": ""})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "command is required");
}

#[tokio::test]
async fn create_uses_gateway_cwd_when_unset() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sessions"))
        .and(body_json(json!({
            "command": "bash",
            "cwd": "/home/tester",
            "title": "Terminal",
            "cols": 100,
            "rows": 30
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "s2"})))
        .expect(1)
        .mount(&backend)
        .await;

    let (status, _, body) = send(
        gateway_for(&backend.uri()),
        json_request(
            Method::POST,
            "/api/sessions",
            json!({"command": "bash", "cols": 100, "rows": 30}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sessionId"], "s2");
}

#[tokio::test]
async fn list_adds_client_field_names() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "a",
                "title": "shell",
                "command": "zsh",
                "cwd": "/home",
                "createdAt": "2024-05-01T10:00:00Z",
                "updatedAt": "2024-05-01T10:02:00Z",
                "active": true,
                "clients": 0
            }
        ])))
        .mount(&backend)
        .await;

    let (status, _, body) = send(gateway_for(&backend.uri()), get("/api/sessions")).await;

    assert_eq!(status, StatusCode::OK);
    let record = &body[0];
    assert_eq!(record["command"], json!(["zsh"]));
    assert_eq!(record["name"], "shell");
    assert_eq!(record["title"], "shell");
    assert_eq!(record["workingDir"], "/home");
    assert_eq!(record["cwd"], "/home");
    assert_eq!(record["startedAt"], "2024-05-01T10:00:00Z");
    assert_eq!(record["lastModified"], "2024-05-01T10:02:00Z");
    assert_eq!(record["clients"], 0);
    assert_eq!(record["status"], "running");
}

#[tokio::test]
async fn single_session_is_mapped_and_errors_are_mirrored() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/a"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "a", "command": "top", "cwd": "/"})),
        )
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "Session not found"})),
        )
        .mount(&backend)
        .await;

    let router = gateway_for(&backend.uri());
    let (status, _, body) = send(router.clone(), get("/api/sessions/a")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["command"], json!(["top"]));
    assert_eq!(body["workingDir"], "/");

    let (status, _, body) = send(router, get("/api/sessions/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Session not found"}));
}

#[tokio::test]
async fn unreachable_backend_is_a_json_502() {
    let (status, _, body) = send(gateway_for(&dead_backend()), get("/api/sessions")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().starts_with("Backend unavailable"));
}

#[tokio::test]
async fn other_api_paths_pass_through_with_filtered_headers() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sessions/a/input"))
        .and(header_matcher("x-client", "web"))
        .and(body_json(json!({"type": "input", "data": "ls\n"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/sessions/a"))
        .respond_with(ResponseTemplate::new(500).set_body_string("kill failed"))
        .mount(&backend)
        .await;

    let router = gateway_for(&backend.uri());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/sessions/a/input")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-client", "web")
        .header(header::TE, "trailers")
        .body(Body::from(r#"{ "type": "input", "data": "ls\n" }"#))
        .unwrap();
    let (status, _, body) = send(router.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let received = backend.received_requests().await.unwrap();
    assert!(received[0].headers.get("te").is_none());

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri("/api/sessions/a")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(router, delete).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "kill failed");
}

#[tokio::test]
async fn upgrade_requests_are_redirected_to_the_backend() {
    let router = gateway_for(&dead_backend());
    let request = Request::builder()
        .uri("/buffers?client=web")
        .header(header::HOST, "box.lan:3001")
        .header(header::UPGRADE, "websocket")
        .header(header::CONNECTION, "Upgrade")
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = send(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        headers["x-websocket-direct-url"],
        "ws://box.lan:4021/buffers?client=web"
    );
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("ws://box.lan:4021/buffers?client=web"));
}

#[tokio::test]
async fn preflight_and_cors_headers() {
    let router = gateway_for(&dead_backend());
    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/anything")
        .body(Body::empty())
        .unwrap();

    let (status, headers, _) = send(router.clone(), preflight).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(
        headers["access-control-allow-methods"],
        "GET, POST, PUT, PATCH, DELETE, OPTIONS"
    );
    assert_eq!(
        headers["access-control-allow-headers"],
        "Content-Type, Authorization, X-Requested-With"
    );
    assert_eq!(headers["access-control-max-age"], "86400");

    let (status, headers, body) = send(router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn config_points_browsers_at_the_backend() {
    let router = gateway_for(&dead_backend());
    let request = Request::builder()
        .uri("/api/config")
        .header(header::HOST, "box.lan:3001")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = send(router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(body["websocketUrl"], "wss://box.lan:4021");
    assert_eq!(body["origin"], "https://box.lan:3001");
    assert_eq!(body["features"]["directWebSocket"], true);
}

#[tokio::test(start_paused = true)]
async fn control_stream_closes_after_five_minutes() {
    let router = gateway_for("http://127.0.0.1:9");
    let response = router.oneshot(get("/api/control/stream")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(response.headers()["x-accel-buffering"], "no");

    let start = tokio::time::Instant::now();
    let mut chunks = response.into_body().into_data_stream();
    let first = chunks.next().await.unwrap().unwrap();
    assert_eq!(&first[..], b":ok\n\n");

    let mut heartbeats = 0;
    while let Some(chunk) = chunks.next().await {
        assert_eq!(&chunk.unwrap()[..], b":heartbeat\n\n");
        heartbeats += 1;
    }

    assert_eq!(heartbeats, 9);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(300));
    assert!(elapsed < Duration::from_secs(301));
}

#[tokio::test(start_paused = true)]
async fn events_stream_opens_with_connected_frame() {
    let router = gateway_for("http://127.0.0.1:9");
    let response = router.oneshot(get("/api/events")).await.unwrap();
    let mut chunks = response.into_body().into_data_stream();

    let first = chunks.next().await.unwrap().unwrap();
    let text = String::from_utf8(first.to_vec()).unwrap();
    assert!(text.starts_with("id:1\nevent:connected\ndata:{"));
    assert!(text.contains("\"type\":\"connected\""));

    let heartbeat = chunks.next().await.unwrap().unwrap();
    assert!(heartbeat.starts_with(b":heartbeat "));
}

#[tokio::test]
async fn compressed_backend_replies_reach_the_client_decoded() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .set_body_raw(gzip(&json!([{"id": "a", "command": "zsh"}])), "application/json"),
        )
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/a/stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .set_body_raw(gzip(&json!({"bytes": 42})), "application/json"),
        )
        .mount(&backend)
        .await;

    let router = gateway_for(&backend.uri());
    let compressed_get = |uri: &str| {
        Request::builder()
            .uri(uri)
            .header(header::ACCEPT_ENCODING, "gzip, deflate, br")
            .body(Body::empty())
            .unwrap()
    };

    let (status, _, body) = send(router.clone(), compressed_get("/api/sessions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["command"], json!(["zsh"]));

    let (status, headers, body) = send(router, compressed_get("/api/sessions/a/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
    assert_eq!(body, json!({"bytes": 42}));
}

#[tokio::test]
async fn resize_passes_through_with_method_and_body() {
    let backend = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/sessions/s1/resize"))
        .and(body_json(json!({"cols": 120, "rows": 40})))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&backend)
        .await;

    let (status, _, body) = send(
        gateway_for(&backend.uri()),
        json_request(
            Method::PATCH,
            "/api/sessions/s1/resize",
            json!({"cols": 120, "rows": 40}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({"success": true}));
}

#[tokio::test]
async fn create_against_unreachable_backend_is_a_json_502() {
    let (status, _, body) = send(
        gateway_for(&dead_backend()),
        json_request(Method::POST, "/api/sessions", json!({"command": "bash"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().starts_with("Backend unavailable"));
}

#[tokio::test]
async fn session_socket_upgrades_are_redirected() {
    let request = Request::builder()
        .uri("/api/sessions/s1/ws")
        .header(header::HOST, "box.lan:3001")
        .header(header::UPGRADE, "websocket")
        .header(header::CONNECTION, "Upgrade")
        .body(Body::empty())
        .unwrap();

    let (status, headers, _) = send(gateway_for(&dead_backend()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        headers["x-websocket-direct-url"],
        "ws://box.lan:4021/api/sessions/s1/ws"
    );
}
