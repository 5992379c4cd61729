//! Frames exchanged on the multiplexed snapshot connection.
//!
//! Control frames travel as JSON text tagged on `type`. Snapshots normally
//! travel as binary frames:
//!
//! ```text
//! +------+----------------+-------------+---------------------+
//! | 0xBF | id len (u32 LE)| session id  | snapshot JSON       |
//! +------+----------------+-------------+---------------------+
//! ```
//!
//! A backend may also send a snapshot as a JSON `snapshot` text frame; both
//! decode to [`ServerFrame::Snapshot`].

use serde::{Deserialize, Serialize};

use crate::{BufferSnapshot, ProtocolError, SNAPSHOT_MAGIC};

/// Frames sent by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Subscribe {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Unsubscribe {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Ping,
}

impl ClientFrame {
    pub fn subscribe(session_id: impl Into<String>) -> Self {
        Self::Subscribe {
            session_id: session_id.into(),
        }
    }

    pub fn unsubscribe(session_id: impl Into<String>) -> Self {
        Self::Unsubscribe {
            session_id: session_id.into(),
        }
    }

    pub fn to_text(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_text(text: &str) -> Result<Self, ProtocolError> {
        parse_tagged(text, &["subscribe", "unsubscribe", "ping"])
    }
}

/// Frames sent by the snapshot publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Connected {
        version: String,
    },
    Subscribed {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Unsubscribed {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Snapshot {
        #[serde(rename = "sessionId")]
        session_id: String,
        snapshot: BufferSnapshot,
    },
    Heartbeat,
    Pong,
    Error {
        message: String,
    },
}

const SERVER_FRAME_TAGS: &[&str] = &[
    "connected",
    "subscribed",
    "unsubscribed",
    "snapshot",
    "heartbeat",
    "pong",
    "error",
];

impl ServerFrame {
    pub fn to_text(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a text frame, rejecting tags this build does not know.
    pub fn from_text(text: &str) -> Result<Self, ProtocolError> {
        let frame: Self = parse_tagged(text, SERVER_FRAME_TAGS)?;
        if let Self::Snapshot { snapshot, .. } = &frame {
            snapshot.validate()?;
        }
        Ok(frame)
    }

    /// Decode a binary frame. Only snapshot frames are binary.
    pub fn from_binary(data: &[u8]) -> Result<Self, ProtocolError> {
        let (session_id, snapshot) = decode_snapshot_frame(data)?;
        Ok(Self::Snapshot {
            session_id,
            snapshot,
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Subscribed { session_id }
            | Self::Unsubscribed { session_id }
            | Self::Snapshot { session_id, .. } => Some(session_id),
            _ => None,
        }
    }
}

fn parse_tagged<T: serde::de::DeserializeOwned>(
    text: &str,
    known: &[&str],
) -> Result<T, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let tag = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtocolError::MissingFrameType)?;

    if !known.contains(&tag) {
        return Err(ProtocolError::UnknownFrameType(tag.to_string()));
    }

    Ok(serde_json::from_value(value)?)
}

// ============================================================================
// Binary snapshot frames
// ============================================================================

/// Encode a snapshot addressed to `session_id` as a binary frame.
pub fn encode_snapshot_frame(
    session_id: &str,
    snapshot: &BufferSnapshot,
) -> Result<Vec<u8>, ProtocolError> {
    let body = serde_json::to_vec(snapshot)?;
    let id = session_id.as_bytes();

    let mut frame = Vec::with_capacity(1 + 4 + id.len() + body.len());
    frame.push(SNAPSHOT_MAGIC);
    frame.extend_from_slice(&(id.len() as u32).to_le_bytes());
    frame.extend_from_slice(id);
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Split a binary frame into its session id and snapshot.
pub fn decode_snapshot_frame(data: &[u8]) -> Result<(String, BufferSnapshot), ProtocolError> {
    let (&magic, rest) = data.split_first().ok_or(ProtocolError::Truncated {
        needed: 1,
        available: 0,
    })?;
    if magic != SNAPSHOT_MAGIC {
        return Err(ProtocolError::BadMagic(magic));
    }

    if rest.len() < 4 {
        return Err(ProtocolError::Truncated {
            needed: 5,
            available: data.len(),
        });
    }
    let (len_bytes, rest) = rest.split_at(4);
    let id_len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
        as usize;

    if rest.len() < id_len {
        return Err(ProtocolError::Truncated {
            needed: 5 + id_len,
            available: data.len(),
        });
    }
    let (id_bytes, body) = rest.split_at(id_len);
    let session_id = std::str::from_utf8(id_bytes)
        .map_err(|_| ProtocolError::InvalidSessionId)?
        .to_string();

    let snapshot: BufferSnapshot = serde_json::from_slice(body)?;
    snapshot.validate()?;

    Ok((session_id, snapshot))
}
