use thiserror::Error;
use tunnelforge_types::ProtocolError;

#[derive(Debug, Error)]
pub enum MuxError {
    /// The peer went away. Recovered by reconnecting, never surfaced to
    /// subscribers.
    #[error("transport disconnected")]
    TransportDisconnected,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid transport URL '{0}'")]
    InvalidUrl(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("multiplexer has been shut down")]
    Closed,
}
