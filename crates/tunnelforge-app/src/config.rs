//! Runtime configuration for the gateway and control channel.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use anyhow::{Context, Result};
use url::Url;

use crate::cli::ServeArgs;
use crate::web::EventStreamConfig;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:4021";
pub const DEFAULT_BACKEND_PORT: u16 = 4021;
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const CONTROL_DIR_NAME: &str = ".tunnelforge";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub backend_url: Url,
    /// Port clients dial for websocket traffic, which bypasses the gateway.
    pub backend_ws_port: u16,
    /// Working directory for sessions created without one.
    pub fallback_cwd: String,
    pub event_streams: EventStreamConfig,
}

impl GatewayConfig {
    pub fn new(bind_addr: SocketAddr, backend_url: Url) -> Self {
        let backend_ws_port = backend_url
            .port_or_known_default()
            .unwrap_or(DEFAULT_BACKEND_PORT);
        let fallback_cwd = std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|_| "/".to_string());

        Self {
            bind_addr,
            backend_url,
            backend_ws_port,
            fallback_cwd,
            event_streams: EventStreamConfig::default(),
        }
    }

    pub fn from_args(args: &ServeArgs) -> Result<Self> {
        let bind_addr = resolve_bind_addr(&args.host, args.port)?;
        let backend_url = Url::parse(&args.backend_url)
            .with_context(|| format!("invalid backend URL: {}", args.backend_url))?;

        let mut config = Self::new(bind_addr, backend_url);
        if let Some(port) = args.backend_ws_port {
            config.backend_ws_port = port;
        }
        Ok(config)
    }

    /// URL the gateway is reachable on, for status output.
    pub fn public_url(&self) -> String {
        let host = if self.bind_addr.ip().is_unspecified() {
            "localhost".to_string()
        } else {
            self.bind_addr.ip().to_string()
        };
        format!("http://{host}:{}", self.bind_addr.port())
    }
}

fn resolve_bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve bind host {host}"))?
        .next()
        .with_context(|| format!("no address for bind host {host}"))
}

/// Directory holding the control socket: explicit, else `~/.tunnelforge`.
pub fn control_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(CONTROL_DIR_NAME)
    })
}
