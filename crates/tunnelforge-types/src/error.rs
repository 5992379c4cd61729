use thiserror::Error;

/// Failures decoding frames at the transport boundary.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame is truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unexpected magic byte 0x{0:02X}")]
    BadMagic(u8),

    #[error("session id is not valid UTF-8")]
    InvalidSessionId,

    #[error("unknown frame type '{0}'")]
    UnknownFrameType(String),

    #[error("frame has no 'type' field")]
    MissingFrameType,

    #[error("row {row} has {width} cells but the grid is {cols} columns wide")]
    RowTooWide { row: usize, width: usize, cols: u16 },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
