//! Client half of the snapshot protocol.
//!
//! A [`Multiplexer`] owns exactly one transport connection and fans the
//! snapshots arriving on it out to every [`Subscription`] registered for the
//! addressed session. Subscriptions are channels: the demux loop is the
//! producer and whatever renders the session is the consumer.

pub mod backoff;
pub mod error;
#[cfg(feature = "runtime")]
pub mod multiplexer;
pub mod registry;
pub mod state;
#[cfg(feature = "runtime")]
pub mod transport;
#[cfg(feature = "runtime")]
pub mod ws;

pub use backoff::{Backoff, BackoffConfig};
pub use error::MuxError;
#[cfg(feature = "runtime")]
pub use multiplexer::{Multiplexer, MultiplexerConfig, Subscription};
pub use registry::{Registration, Release, SubscriptionRegistry};
pub use state::ConnectionState;
#[cfg(feature = "runtime")]
pub use transport::{Connector, Transport};
#[cfg(feature = "runtime")]
pub use ws::{WsConnector, WsTransport};
