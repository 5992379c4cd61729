use std::path::{Path, PathBuf};

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tracing::debug;

use super::{
    ControlCodec, ControlError, ControlMessage, FollowRequest, FollowResponse, ForwardRequest,
    ForwardResponse, GitEventAck, GitEventKind, GitEventNotify, StatusResponse,
};

/// Client side of the control socket. Each call opens a fresh connection.
#[derive(Debug, Clone)]
pub struct ControlClient {
    path: PathBuf,
}

impl ControlClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connect(&self) -> Result<UnixStream, ControlError> {
        let not_running = || ControlError::ServiceNotRunning {
            path: self.path.clone(),
        };
        if !self.path.exists() {
            return Err(not_running());
        }
        UnixStream::connect(&self.path).await.map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => not_running(),
            _ => ControlError::Io(err),
        })
    }

    pub async fn request(&self, message: ControlMessage) -> Result<ControlMessage, ControlError> {
        let stream = self.connect().await?;
        exchange(stream, message).await
    }

    pub async fn status(&self) -> Result<StatusResponse, ControlError> {
        match self.request(ControlMessage::StatusRequest).await? {
            ControlMessage::StatusResponse(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn follow(&self, request: FollowRequest) -> Result<FollowResponse, ControlError> {
        match self.request(ControlMessage::FollowRequest(request)).await? {
            ControlMessage::FollowResponse(response) => Ok(response),
            other => Err(unexpected(other)),
        }
    }

    pub async fn git_event(
        &self,
        repo_path: impl Into<String>,
        kind: GitEventKind,
    ) -> Result<GitEventAck, ControlError> {
        let notify = GitEventNotify {
            repo_path: repo_path.into(),
            kind,
        };
        match self.request(ControlMessage::GitEventNotify(notify)).await? {
            ControlMessage::GitEventAck(ack) => Ok(ack),
            other => Err(unexpected(other)),
        }
    }

    /// Type `command` into a session. A backend refusal is reported as
    /// [`ControlError::Rejected`].
    pub async fn forward(
        &self,
        session_id: impl Into<String>,
        command: impl Into<String>,
    ) -> Result<(), ControlError> {
        let request = ForwardRequest {
            session_id: session_id.into(),
            command: command.into(),
        };
        match self.request(ControlMessage::ForwardRequest(request)).await? {
            ControlMessage::ForwardResponse(ForwardResponse { success: true, .. }) => Ok(()),
            ControlMessage::ForwardResponse(ForwardResponse { error, .. }) => Err(
                ControlError::Rejected(error.unwrap_or_else(|| "forward failed".to_string())),
            ),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(message: ControlMessage) -> ControlError {
    ControlError::Codec(format!(
        "unexpected {:?} response",
        message.message_type()
    ))
}

/// Send one request over `io` and wait for its response.
pub async fn exchange<T>(io: T, message: ControlMessage) -> Result<ControlMessage, ControlError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(io, ControlCodec);
    debug!(target: "control", kind = ?message.message_type(), "sending control request");
    framed.send(message).await?;

    match framed.next().await {
        Some(Ok(ControlMessage::Error(error))) => Err(ControlError::Rejected(error.message)),
        Some(Ok(response)) => Ok(response),
        Some(Err(err)) => Err(err),
        None => Err(ControlError::Closed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use tokio_util::codec::Encoder;

    fn encoded(message: ControlMessage) -> Vec<u8> {
        let mut buf = BytesMut::new();
        ControlCodec.encode(message, &mut buf).unwrap();
        buf.to_vec()
    }

    #[tokio::test]
    async fn exchange_writes_request_and_reads_response() {
        let response = ControlMessage::GitEventAck(GitEventAck { handled: true });
        let io = tokio_test::io::Builder::new()
            .write(&encoded(ControlMessage::StatusRequest))
            .read(&encoded(response.clone()))
            .build();

        let got = exchange(io, ControlMessage::StatusRequest).await.unwrap();
        assert_eq!(got, response);
    }

    #[tokio::test]
    async fn error_responses_become_rejections() {
        let io = tokio_test::io::Builder::new()
            .write(&encoded(ControlMessage::StatusRequest))
            .read(&encoded(ControlMessage::error("BUSY", "try later")))
            .build();

        let err = exchange(io, ControlMessage::StatusRequest).await.unwrap_err();
        assert!(matches!(err, ControlError::Rejected(message) if message == "try later"));
    }

    #[tokio::test]
    async fn missing_socket_means_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let client = ControlClient::new(dir.path().join("api.sock"));
        let err = client.status().await.unwrap_err();
        assert!(err.is_service_not_running(), "{err}");
    }
}
