// Gateway: session translation, pass-through proxy and event streams
pub mod backend;
pub mod error;
pub mod events;
pub mod headers;
pub mod routes;
pub mod server;
pub mod translate;

pub use backend::{BackendClient, BackendResponse};
pub use error::GatewayError;
pub use events::{EventHub, EventStreamConfig, GitEventKind, GitNotice};
pub use routes::{create_router, AppState};
pub use server::GatewayServer;
