//! TunnelForge gateway
//!
//! HTTP front door for a terminal session backend: translates session
//! requests between the browser's vocabulary and the backend's, proxies the
//! rest of `/api`, serves event streams, and hosts the local control socket
//! the CLI talks to.

pub use tunnelforge_types as types;

pub mod app;
pub mod cli;
pub mod config;
pub mod control;
pub mod logging;
pub mod web;

pub use cli::{Cli, Commands, ServeArgs};
pub use config::GatewayConfig;
pub use control::{ControlClient, ControlError, ControlServer, ControlState};
pub use web::{create_router, AppState, EventHub, GatewayError, GatewayServer};
