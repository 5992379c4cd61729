use gloo_net::http::Request;
use serde::Deserialize;
use tunnelforge_mux::BackoffConfig;
use tunnelforge_render::DeviceProfile;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Window};

mod device;
mod dom;
mod painter;
mod socket;
mod utils;
mod view;

pub use view::TerminalView;

use socket::BufferSocket;

/// Buffer port used when the gateway cannot tell us.
const FALLBACK_BUFFERS_PORT: u16 = 4021;

/// Initialize the WASM module
/// This sets up panic hooks and logging
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());

    log::info!("TunnelForge terminal client initialized");
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientConfig {
    buffers_url: String,
}

/// Page-wide terminal client. Every attached view shares one buffer
/// connection.
#[wasm_bindgen]
pub struct TerminalClient {
    socket: BufferSocket,
    profile: DeviceProfile,
}

#[wasm_bindgen]
impl TerminalClient {
    /// Connect to `buffers_url`, or to the default buffer port on this
    /// page's host.
    #[wasm_bindgen(constructor)]
    pub fn new(buffers_url: Option<String>) -> Result<TerminalClient, JsValue> {
        let url = match buffers_url {
            Some(url) => url,
            None => utils::build_buffers_url(FALLBACK_BUFFERS_PORT)?,
        };
        Ok(Self::with_url(url))
    }

    /// Ask the gateway where the buffer stream lives, then connect there.
    #[wasm_bindgen(js_name = fromGateway)]
    pub async fn from_gateway() -> Result<TerminalClient, JsValue> {
        match fetch_config().await {
            Ok(config) => Ok(Self::with_url(config.buffers_url)),
            Err(err) => {
                log::warn!("gateway config unavailable, using defaults: {:?}", err);
                Self::new(None)
            }
        }
    }

    #[wasm_bindgen(getter)]
    pub fn url(&self) -> String {
        self.socket.url().to_string()
    }

    /// Connection state: `idle`, `connecting`, `connected`,
    /// `reconnecting (attempt N)` or `closed`.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.socket.state().to_string()
    }

    /// Render `session_id` into the element with id `container_id`.
    pub fn attach(&self, session_id: &str, container_id: &str) -> Result<TerminalView, JsValue> {
        let container = dom::get_html_element_by_id(&document()?, container_id)?;
        device::apply_profile(&container, &self.profile);

        let subscription = self.socket.subscribe(session_id)?;
        TerminalView::attach(subscription, container, &self.profile)
    }

    pub fn close(&self) {
        self.socket.close();
    }
}

impl TerminalClient {
    fn with_url(url: String) -> Self {
        let profile = DeviceProfile::classify(&device::detect());
        log::debug!("device profile: {:?}", profile);
        Self {
            socket: BufferSocket::new(url, BackoffConfig::default()),
            profile,
        }
    }
}

async fn fetch_config() -> Result<ClientConfig, JsValue> {
    let response = Request::get("/api/config")
        .send()
        .await
        .map_err(|e| utils::js_error("Failed to fetch config", e))?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!(
            "Config request failed: {}",
            response.status()
        )));
    }
    response
        .json::<ClientConfig>()
        .await
        .map_err(|e| utils::js_error("Failed to parse config", e))
}

/// Get the window object
fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("No window object"))
}

/// Get the document object
fn document() -> Result<Document, JsValue> {
    window()?
        .document()
        .ok_or_else(|| JsValue::from_str("No document object"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn config_uses_buffers_url() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"websocketUrl":"ws://h:4021","buffersUrl":"ws://h:4021/buffers","features":{}}"#,
        )
        .unwrap();
        assert_eq!(config.buffers_url, "ws://h:4021/buffers");
    }

    #[wasm_bindgen_test]
    fn timeout_is_clamped() {
        use std::time::Duration;
        assert_eq!(utils::timeout_millis(Duration::from_millis(250)), 250);
        assert_eq!(
            utils::timeout_millis(Duration::from_secs(u64::MAX / 2)),
            i32::MAX as u32
        );
    }
}
