// Control channel: local unix socket used by the CLI to talk to a running server
pub mod client;
pub mod codec;
pub mod error;
pub mod git;
pub mod protocol;
pub mod server;

pub use client::ControlClient;
pub use codec::ControlCodec;
pub use error::ControlError;
pub use protocol::{
    ControlMessage, ErrorMessage, FollowMode, FollowRequest, FollowResponse, ForwardRequest,
    ForwardResponse, GitEventAck, GitEventKind, GitEventNotify, MessageType, StatusResponse,
};
pub use server::{ControlServer, ControlState};

use std::path::{Path, PathBuf};

pub const SOCKET_NAME: &str = "api.sock";

pub fn socket_path(control_dir: &Path) -> PathBuf {
    control_dir.join(SOCKET_NAME)
}
