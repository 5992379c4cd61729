use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use tunnelforge_types::{ClientFrame, ServerFrame, BUFFERS_PATH};
use url::Url;

use crate::{Connector, MuxError, Transport};

/// Connects to a backend's multiplexed `/buffers` websocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
}

impl WsConnector {
    pub fn new(url: &str) -> Result<Self, MuxError> {
        let url = Url::parse(url).map_err(|_| MuxError::InvalidUrl(url.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self { url }),
            _ => Err(MuxError::InvalidUrl(url.to_string())),
        }
    }

    /// Derive the websocket URL from the backend's HTTP base URL.
    pub fn from_backend(base_url: &str) -> Result<Self, MuxError> {
        let mut url =
            Url::parse(base_url).map_err(|_| MuxError::InvalidUrl(base_url.to_string()))?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            _ => return Err(MuxError::InvalidUrl(base_url.to_string())),
        };
        url.set_scheme(scheme)
            .map_err(|_| MuxError::InvalidUrl(base_url.to_string()))?;
        url.set_path(BUFFERS_PATH);
        Ok(Self { url })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Conn = WsTransport;

    async fn connect(&self) -> Result<WsTransport, MuxError> {
        debug!(url = %self.url, "opening buffer websocket");
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| MuxError::Transport(e.to_string()))?;
        Ok(WsTransport { stream })
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: &ClientFrame) -> Result<(), MuxError> {
        let text = frame.to_text()?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| MuxError::Transport(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<ServerFrame, MuxError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(MuxError::Transport(e.to_string()))),
            };
            let frame = match message {
                Message::Text(text) => ServerFrame::from_text(&text),
                Message::Binary(data) => ServerFrame::from_binary(&data),
                Message::Close(_) => return None,
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };
            return Some(frame.map_err(MuxError::from));
        }
    }

    async fn close(&mut self) -> Result<(), MuxError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| MuxError::Transport(e.to_string()))
    }
}
