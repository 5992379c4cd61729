use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use futures::{SinkExt, StreamExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    git, ControlCodec, ControlError, ControlMessage, FollowMode, FollowRequest, FollowResponse,
    ForwardRequest, ForwardResponse, GitEventAck, GitEventNotify, StatusResponse,
};
use crate::web::{BackendClient, EventHub, GitNotice};

/// What the control server knows about the running gateway.
pub struct ControlState {
    pub port: u16,
    pub url: String,
    pub version: String,
    pub backend: BackendClient,
    pub events: Arc<EventHub>,
    follow: Mutex<FollowMode>,
}

impl ControlState {
    pub fn new(port: u16, url: String, backend: BackendClient, events: Arc<EventHub>) -> Self {
        Self {
            port,
            url,
            version: env!("CARGO_PKG_VERSION").to_string(),
            backend,
            events,
            follow: Mutex::new(FollowMode {
                enabled: false,
                branch: None,
                repo_path: None,
            }),
        }
    }

    pub fn follow_mode(&self) -> FollowMode {
        self.follow
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Answer one request. Never fails: problems become error responses.
    pub async fn handle(&self, message: ControlMessage) -> ControlMessage {
        match message {
            ControlMessage::StatusRequest => ControlMessage::StatusResponse(self.status()),
            ControlMessage::FollowRequest(request) => {
                ControlMessage::FollowResponse(self.follow(request).await)
            }
            ControlMessage::GitEventNotify(event) => {
                ControlMessage::GitEventAck(self.git_event(event))
            }
            ControlMessage::ForwardRequest(request) => {
                ControlMessage::ForwardResponse(self.forward(request).await)
            }
            other => ControlMessage::error(
                "UNEXPECTED_MESSAGE",
                format!("{:?} is not a request", other.message_type()),
            ),
        }
    }

    fn status(&self) -> StatusResponse {
        let follow = self.follow_mode();
        StatusResponse {
            running: true,
            port: Some(self.port),
            url: Some(self.url.clone()),
            version: Some(self.version.clone()),
            follow_mode: follow.enabled.then_some(follow),
        }
    }

    async fn follow(&self, request: FollowRequest) -> FollowResponse {
        if !request.enable {
            let mut follow = self.follow.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = follow.branch.take();
            follow.enabled = false;
            follow.repo_path = None;
            info!(target: "control", "follow mode disabled");
            return FollowResponse {
                success: true,
                current_branch: previous,
                error: None,
            };
        }

        let branch = match request.branch.filter(|b| !b.trim().is_empty()) {
            Some(branch) => Ok(branch),
            None => match request.repo_path.as_deref() {
                Some(repo) => git::current_branch(Path::new(repo)).await,
                None => Err(ControlError::Rejected(
                    "a branch or repository path is required to enable follow mode".into(),
                )),
            },
        };

        let mut follow = self.follow.lock().unwrap_or_else(PoisonError::into_inner);
        let branch = match branch {
            Ok(branch) => branch,
            Err(err) => {
                warn!(target: "control", error = %err, "follow mode refused");
                return FollowResponse {
                    success: false,
                    current_branch: follow.branch.clone(),
                    error: Some(err.to_string()),
                };
            }
        };

        info!(target: "control", branch = %branch, repo = ?request.repo_path, "follow mode enabled");
        *follow = FollowMode {
            enabled: true,
            branch: Some(branch.clone()),
            repo_path: request.repo_path,
        };
        FollowResponse {
            success: true,
            current_branch: Some(branch),
            error: None,
        }
    }

    fn git_event(&self, event: GitEventNotify) -> GitEventAck {
        let listeners = self.events.publish_git(GitNotice {
            repo_path: event.repo_path.clone(),
            kind: event.kind,
        });
        debug!(target: "control", repo = %event.repo_path, kind = ?event.kind, listeners, "git event relayed");
        GitEventAck { handled: true }
    }

    async fn forward(&self, request: ForwardRequest) -> ForwardResponse {
        let input = format!("{}\n", request.command);
        match self.backend.post_input(&request.session_id, &input).await {
            Ok(()) => {
                info!(target: "control", session_id = %request.session_id, "forwarded command");
                ForwardResponse {
                    success: true,
                    error: None,
                }
            }
            Err(err) => {
                warn!(target: "control", session_id = %request.session_id, error = %err, "forward failed");
                ForwardResponse {
                    success: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

/// Unix socket server for CLI requests.
pub struct ControlServer {
    path: PathBuf,
    listener: UnixListener,
    state: Arc<ControlState>,
}

impl ControlServer {
    /// Bind the socket, replacing any stale socket file left behind by a
    /// previous run.
    pub fn bind(path: impl Into<PathBuf>, state: Arc<ControlState>) -> Result<Self, ControlError> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        remove_socket(&path)?;

        let listener = UnixListener::bind(&path)?;
        info!(target: "control", path = %path.display(), "control socket listening");
        Ok(Self {
            path,
            listener,
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until `shutdown` is cancelled, then remove the
    /// socket file.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ControlError> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(serve_client(stream, state));
                    }
                    Err(err) => warn!(target: "control", error = %err, "accept failed"),
                },
            }
        }

        drop(self.listener);
        remove_socket(&self.path)?;
        info!(target: "control", "control socket closed");
        Ok(())
    }
}

fn remove_socket(path: &Path) -> Result<(), ControlError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(target: "control", path = %path.display(), "removed socket file");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

async fn serve_client(stream: UnixStream, state: Arc<ControlState>) {
    let mut framed = Framed::new(stream, ControlCodec);

    while let Some(message) = framed.next().await {
        let response = match message {
            Ok(request) => state.handle(request).await,
            Err(err) => {
                warn!(target: "control", error = %err, "bad control frame");
                let _ = framed
                    .send(ControlMessage::error("INVALID_FRAME", err.to_string()))
                    .await;
                break;
            }
        };
        if let Err(err) = framed.send(response).await {
            debug!(target: "control", error = %err, "client went away");
            break;
        }
    }
}
