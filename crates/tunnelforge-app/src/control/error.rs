use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("TunnelForge server is not running (no control socket at {})", path.display())]
    ServiceNotRunning { path: PathBuf },

    #[error("control socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed control frame: {0}")]
    Codec(String),

    #[error("{0}")]
    Rejected(String),

    #[error("control connection closed before a response arrived")]
    Closed,

    #[error("{} is not a git repository", path.display())]
    NotARepository { path: PathBuf },

    #[error("HEAD of {} is detached; pass a branch to follow", path.display())]
    DetachedHead { path: PathBuf },
}

impl ControlError {
    pub fn is_service_not_running(&self) -> bool {
        matches!(self, ControlError::ServiceNotRunning { .. })
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        ControlError::Codec(err.to_string())
    }
}
