//! Core types shared by every tunnelforge crate.
//!
//! The cell grid model, the snapshot wire protocol and the session record
//! live here so the gateway, the multiplexer and the renderers agree on a
//! single definition of each.

pub mod error;
pub mod frame;
pub mod session;
pub mod snapshot;

pub use error::ProtocolError;
pub use frame::{decode_snapshot_frame, encode_snapshot_frame, ClientFrame, ServerFrame};
pub use session::{Session, SessionStatus};
pub use snapshot::{BufferSnapshot, Cell, CellAttributes};

// ============================================================================
// Constants
// ============================================================================

/// Version string announced in the `connected` frame.
pub const PROTOCOL_VERSION: &str = "1.0";

/// First byte of every binary snapshot frame.
pub const SNAPSHOT_MAGIC: u8 = 0xBF;

/// Columns used when a create request leaves them unset.
pub const DEFAULT_COLS: u16 = 80;

/// Rows used when a create request leaves them unset.
pub const DEFAULT_ROWS: u16 = 24;

/// Path of the multiplexed snapshot endpoint on the backend.
pub const BUFFERS_PATH: &str = "/buffers";
