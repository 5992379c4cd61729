//! Control channel messages.
//!
//! Each frame carries a one-byte message type and a JSON payload; see
//! [`ControlCodec`](super::ControlCodec) for the framing.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::ControlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Error = 0x05,
    StatusRequest = 0x20,
    StatusResponse = 0x21,
    FollowRequest = 0x30,
    FollowResponse = 0x31,
    GitEventNotify = 0x32,
    GitEventAck = 0x33,
    ForwardRequest = 0x40,
    ForwardResponse = 0x41,
}

impl MessageType {
    pub fn from_byte(value: u8) -> Result<Self, ControlError> {
        Ok(match value {
            0x05 => MessageType::Error,
            0x20 => MessageType::StatusRequest,
            0x21 => MessageType::StatusResponse,
            0x30 => MessageType::FollowRequest,
            0x31 => MessageType::FollowResponse,
            0x32 => MessageType::GitEventNotify,
            0x33 => MessageType::GitEventAck,
            0x40 => MessageType::ForwardRequest,
            0x41 => MessageType::ForwardResponse,
            other => {
                return Err(ControlError::Codec(format!(
                    "unknown message type 0x{other:02x}"
                )))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GitEventKind {
    Checkout,
    Commit,
    Merge,
    Rebase,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowMode {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_mode: Option<FollowMode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
    pub enable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitEventNotify {
    pub repo_path: String,
    #[serde(rename = "type")]
    pub kind: GitEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitEventAck {
    pub handled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    pub session_id: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    StatusRequest,
    StatusResponse(StatusResponse),
    FollowRequest(FollowRequest),
    FollowResponse(FollowResponse),
    GitEventNotify(GitEventNotify),
    GitEventAck(GitEventAck),
    ForwardRequest(ForwardRequest),
    ForwardResponse(ForwardResponse),
    Error(ErrorMessage),
}

impl ControlMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ControlMessage::Error(ErrorMessage {
            code: code.to_string(),
            message: message.into(),
        })
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            ControlMessage::StatusRequest => MessageType::StatusRequest,
            ControlMessage::StatusResponse(_) => MessageType::StatusResponse,
            ControlMessage::FollowRequest(_) => MessageType::FollowRequest,
            ControlMessage::FollowResponse(_) => MessageType::FollowResponse,
            ControlMessage::GitEventNotify(_) => MessageType::GitEventNotify,
            ControlMessage::GitEventAck(_) => MessageType::GitEventAck,
            ControlMessage::ForwardRequest(_) => MessageType::ForwardRequest,
            ControlMessage::ForwardResponse(_) => MessageType::ForwardResponse,
            ControlMessage::Error(_) => MessageType::Error,
        }
    }

    pub fn encode_payload(&self) -> Result<Vec<u8>, ControlError> {
        let payload = match self {
            ControlMessage::StatusRequest => b"{}".to_vec(),
            ControlMessage::StatusResponse(m) => serde_json::to_vec(m)?,
            ControlMessage::FollowRequest(m) => serde_json::to_vec(m)?,
            ControlMessage::FollowResponse(m) => serde_json::to_vec(m)?,
            ControlMessage::GitEventNotify(m) => serde_json::to_vec(m)?,
            ControlMessage::GitEventAck(m) => serde_json::to_vec(m)?,
            ControlMessage::ForwardRequest(m) => serde_json::to_vec(m)?,
            ControlMessage::ForwardResponse(m) => serde_json::to_vec(m)?,
            ControlMessage::Error(m) => serde_json::to_vec(m)?,
        };
        Ok(payload)
    }

    pub fn decode(kind: MessageType, payload: &Bytes) -> Result<Self, ControlError> {
        fn parse<T: DeserializeOwned>(payload: &Bytes) -> Result<T, ControlError> {
            Ok(serde_json::from_slice(payload)?)
        }

        Ok(match kind {
            MessageType::StatusRequest => ControlMessage::StatusRequest,
            MessageType::StatusResponse => ControlMessage::StatusResponse(parse(payload)?),
            MessageType::FollowRequest => ControlMessage::FollowRequest(parse(payload)?),
            MessageType::FollowResponse => ControlMessage::FollowResponse(parse(payload)?),
            MessageType::GitEventNotify => ControlMessage::GitEventNotify(parse(payload)?),
            MessageType::GitEventAck => ControlMessage::GitEventAck(parse(payload)?),
            MessageType::ForwardRequest => ControlMessage::ForwardRequest(parse(payload)?),
            MessageType::ForwardResponse => ControlMessage::ForwardResponse(parse(payload)?),
            MessageType::Error => ControlMessage::Error(parse(payload)?),
        })
    }
}
