use std::time::Duration;

use crate::DeviceProfile;

/// Tunables for the rendering engine. The defaults are empirically chosen
/// values, not correctness constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Buffers with more rows than this are virtualized.
    pub virtualize_above_rows: usize,
    /// Rows materialized above and below the visible window.
    pub virtual_padding_rows: usize,
    pub max_font_size_px: f64,
    pub line_height_factor: f64,
    /// Rows kept from the end of the buffer; `None` keeps all of them.
    pub scrollback_rows: Option<usize>,
    /// Foregrounds are lightened or darkened until they reach this contrast
    /// against their background. 1.0 leaves colours as sent.
    pub minimum_contrast_ratio: f64,
    pub debounce: DebounceConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            virtualize_above_rows: 100,
            virtual_padding_rows: 10,
            max_font_size_px: 32.0,
            line_height_factor: 1.2,
            scrollback_rows: None,
            minimum_contrast_ratio: 1.0,
            debounce: DebounceConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Defaults with scrollback and contrast taken from the device profile.
    pub fn for_device(profile: &DeviceProfile) -> Self {
        Self {
            scrollback_rows: Some(profile.scrollback_rows),
            minimum_contrast_ratio: profile.minimum_contrast_ratio,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Touch device that was touched within `recent_touch_window`.
    pub touch_active: Duration,
    /// Touch device with no recent touch.
    pub touch_idle: Duration,
    /// Pointer-driven device; roughly one frame.
    pub desktop: Duration,
    pub recent_touch_window: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            touch_active: Duration::from_millis(200),
            touch_idle: Duration::from_millis(100),
            desktop: Duration::from_millis(16),
            recent_touch_window: Duration::from_millis(1000),
        }
    }
}
