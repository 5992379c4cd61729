use std::path::PathBuf;
use std::sync::Arc;

use axum::response::{sse::Sse, IntoResponse};
use futures::StreamExt;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tunnelforge::control::{
    self, ControlClient, ControlError, ControlServer, ControlState, FollowRequest, GitEventKind,
};
use tunnelforge::web::{BackendClient, EventHub, EventStreamConfig};
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    _dir: tempfile::TempDir,
    socket: PathBuf,
    client: ControlClient,
    events: Arc<EventHub>,
    shutdown: CancellationToken,
    server: JoinHandle<Result<(), ControlError>>,
}

impl Harness {
    async fn start(backend_url: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket = control::socket_path(dir.path());
        let events = Arc::new(EventHub::new(EventStreamConfig::default()));
        let backend = BackendClient::new(Url::parse(backend_url).unwrap()).unwrap();
        let state = Arc::new(ControlState::new(
            3001,
            "http://localhost:3001".to_string(),
            backend,
            Arc::clone(&events),
        ));

        let server = ControlServer::bind(&socket, state).unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(server.run(shutdown.clone()));

        Self {
            client: ControlClient::new(&socket),
            _dir: dir,
            socket,
            events,
            shutdown,
            server,
        }
    }

    async fn stop(self) -> PathBuf {
        self.shutdown.cancel();
        self.server.await.unwrap().unwrap();
        self.socket
    }
}

#[tokio::test]
async fn status_reports_the_running_gateway() {
    let harness = Harness::start("http://127.0.0.1:9").await;

    let status = harness.client.status().await.unwrap();
    assert!(status.running);
    assert_eq!(status.port, Some(3001));
    assert_eq!(status.url.as_deref(), Some("http://localhost:3001"));
    assert_eq!(status.version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
    assert!(status.follow_mode.is_none());

    let socket = harness.stop().await;
    assert!(!socket.exists(), "socket file should be removed on shutdown");
}

#[tokio::test]
async fn follow_mode_round_trip() {
    let harness = Harness::start("http://127.0.0.1:9").await;

    let response = harness
        .client
        .follow(FollowRequest {
            branch: Some("feature/x".into()),
            repo_path: Some("/repo".into()),
            enable: true,
        })
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.current_branch.as_deref(), Some("feature/x"));

    let follow = harness.client.status().await.unwrap().follow_mode.unwrap();
    assert!(follow.enabled);
    assert_eq!(follow.branch.as_deref(), Some("feature/x"));
    assert_eq!(follow.repo_path.as_deref(), Some("/repo"));

    let response = harness
        .client
        .follow(FollowRequest {
            branch: None,
            repo_path: None,
            enable: false,
        })
        .await
        .unwrap();
    assert!(response.success);
    assert!(harness.client.status().await.unwrap().follow_mode.is_none());

    let refused = harness
        .client
        .follow(FollowRequest {
            branch: None,
            repo_path: Some("/repo".into()),
            enable: true,
        })
        .await
        .unwrap();
    assert!(!refused.success);
    assert!(refused.error.unwrap().contains("not a git repository"));

    harness.stop().await;
}

#[tokio::test]
async fn follow_without_branch_uses_the_checked_out_one() {
    let harness = Harness::start("http://127.0.0.1:9").await;
    let repo = tempfile::tempdir().unwrap();
    std::fs::create_dir(repo.path().join(".git")).unwrap();
    std::fs::write(repo.path().join(".git/HEAD"), "ref: refs/heads/feature/y\n").unwrap();
    let repo_path = repo.path().display().to_string();

    let response = harness
        .client
        .follow(FollowRequest {
            branch: None,
            repo_path: Some(repo_path.clone()),
            enable: true,
        })
        .await
        .unwrap();
    assert!(response.success, "{:?}", response.error);
    assert_eq!(response.current_branch.as_deref(), Some("feature/y"));

    let follow = harness.client.status().await.unwrap().follow_mode.unwrap();
    assert_eq!(follow.branch.as_deref(), Some("feature/y"));
    assert_eq!(follow.repo_path.as_deref(), Some(repo_path.as_str()));

    harness.stop().await;
}

#[tokio::test]
async fn forward_types_the_command_into_the_session() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sessions/s1/input"))
        .and(body_json(json!({"type": "input", "data": "ls -la\n"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/sessions/gone/input"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Session not found"})))
        .mount(&backend)
        .await;

    let harness = Harness::start(&backend.uri()).await;
    harness.client.forward("s1", "ls -la").await.unwrap();

    let err = harness.client.forward("gone", "pwd").await.unwrap_err();
    assert!(matches!(err, ControlError::Rejected(_)), "{err}");

    harness.stop().await;
}

#[tokio::test]
async fn git_events_reach_event_stream_subscribers() {
    let harness = Harness::start("http://127.0.0.1:9").await;
    let mut stream = Sse::new(harness.events.events_stream())
        .into_response()
        .into_body()
        .into_data_stream();
    let _connected = stream.next().await.unwrap().unwrap();

    let ack = harness
        .client
        .git_event("/repo", GitEventKind::Commit)
        .await
        .unwrap();
    assert!(ack.handled);

    let frame = stream.next().await.unwrap().unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.starts_with("id:2\nevent:git\n"), "{text}");
    assert!(text.contains("\"repoPath\":\"/repo\""));
    assert!(text.contains("\"type\":\"commit\""));

    drop(stream);
    harness.stop().await;
}

#[tokio::test]
async fn stale_socket_files_are_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let socket = control::socket_path(dir.path());

    // A socket file with nobody behind it reads as "not running".
    drop(std::os::unix::net::UnixListener::bind(&socket).unwrap());
    assert!(socket.exists());
    let err = ControlClient::new(&socket).status().await.unwrap_err();
    assert!(err.is_service_not_running(), "{err}");

    let events = Arc::new(EventHub::new(EventStreamConfig::default()));
    let backend = BackendClient::new(Url::parse("http://127.0.0.1:9").unwrap()).unwrap();
    let state = Arc::new(ControlState::new(3001, "http://localhost:3001".into(), backend, events));
    let server = ControlServer::bind(&socket, state).unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(server.run(shutdown.clone()));

    assert!(ControlClient::new(&socket).status().await.unwrap().running);

    shutdown.cancel();
    task.await.unwrap().unwrap();
    assert!(!socket.exists());
}

#[tokio::test]
async fn missing_control_dir_means_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let client = ControlClient::new(control::socket_path(&dir.path().join("absent")));

    let err = client.forward("s1", "ls").await.unwrap_err();
    assert!(matches!(err, ControlError::ServiceNotRunning { .. }));
}
