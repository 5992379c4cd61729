use tunnelforge_render::{DeviceCapabilities, DeviceProfile};
use wasm_bindgen::JsValue;
use web_sys::HtmlElement;

use crate::dom::set_data;

/// Read what the browser reports about this device. Missing readings stay
/// `None` and count as capable.
pub fn detect() -> DeviceCapabilities {
    let Some(window) = web_sys::window() else {
        return DeviceCapabilities::default();
    };
    let navigator = window.navigator();

    let cores = navigator.hardware_concurrency();
    // Not in every browser, and not in web-sys.
    let memory = js_sys::Reflect::get(&navigator, &JsValue::from_str("deviceMemory"))
        .ok()
        .and_then(|value| value.as_f64());

    DeviceCapabilities {
        hardware_concurrency: (cores > 0.0).then_some(cores as u32),
        device_memory_gib: memory,
        max_touch_points: u32::try_from(navigator.max_touch_points()).unwrap_or(0),
        device_pixel_ratio: window.device_pixel_ratio(),
    }
}

/// Expose the profile to stylesheets as `data-*` attributes.
pub fn apply_profile(container: &HtmlElement, profile: &DeviceProfile) {
    set_data(container, "lowEnd", bool_str(profile.is_low_end));
    set_data(container, "touch", bool_str(profile.is_touch_primary));
    set_data(container, "highDpi", bool_str(profile.has_high_dpi));
    set_data(
        container,
        "minContrast",
        &profile.minimum_contrast_ratio.to_string(),
    );
    set_data(container, "scrollback", &profile.scrollback_rows.to_string());
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
