use async_trait::async_trait;
use tunnelforge_types::{ClientFrame, ServerFrame};

use crate::MuxError;

/// One established bidirectional frame connection.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: &ClientFrame) -> Result<(), MuxError>;

    /// Next decoded frame. `None` once the peer has closed the connection.
    /// Protocol errors for a single frame are returned without closing.
    async fn next_frame(&mut self) -> Option<Result<ServerFrame, MuxError>>;

    async fn close(&mut self) -> Result<(), MuxError> {
        Ok(())
    }
}

/// Factory for transports. The multiplexer calls it once per connection
/// attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: Transport + 'static;

    async fn connect(&self) -> Result<Self::Conn, MuxError>;
}
