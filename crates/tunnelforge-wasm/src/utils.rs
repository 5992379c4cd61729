use std::time::Duration;

use wasm_bindgen::JsValue;

/// `wss:` on https pages, `ws:` otherwise
pub fn get_ws_protocol() -> String {
    let location = web_sys::window()
        .and_then(|w| w.location().protocol().ok())
        .unwrap_or_else(|| "http:".to_string());

    if location == "https:" {
        "wss:".to_string()
    } else {
        "ws:".to_string()
    }
}

/// Get the current host name, without port
pub fn get_hostname() -> Result<String, JsValue> {
    web_sys::window()
        .and_then(|w| w.location().hostname().ok())
        .ok_or_else(|| JsValue::from_str("Failed to get hostname"))
}

/// Buffer stream URL on the page's host at `port`, used when the gateway
/// config cannot be fetched.
pub fn build_buffers_url(port: u16) -> Result<String, JsValue> {
    let protocol = get_ws_protocol();
    let host = get_hostname()?;
    Ok(format!("{}//{}:{}{}", protocol, host, port, tunnelforge_types::BUFFERS_PATH))
}

/// Milliseconds since page load as a Duration, for the debouncer.
pub fn now() -> Duration {
    let ms = web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or_else(js_sys::Date::now);
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}

/// Timer argument for a wait of `delay`, clamped to what setTimeout takes.
pub fn timeout_millis(delay: Duration) -> u32 {
    delay.as_millis().min(i32::MAX as u128) as u32
}

pub fn js_error(context: &str, err: impl std::fmt::Debug) -> JsValue {
    JsValue::from_str(&format!("{context}: {err:?}"))
}
