/// Raw capability readings from the host environment.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCapabilities {
    pub hardware_concurrency: Option<u32>,
    /// Approximate memory in GiB as browsers report it.
    pub device_memory_gib: Option<f64>,
    pub max_touch_points: u32,
    pub device_pixel_ratio: f64,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            hardware_concurrency: None,
            device_memory_gib: None,
            max_touch_points: 0,
            device_pixel_ratio: 1.0,
        }
    }
}

const LOW_END_MAX_CORES: u32 = 2;
const LOW_END_MAX_MEMORY_GIB: f64 = 2.0;
const HIGH_DPI_RATIO: f64 = 2.0;

/// Rendering choices derived from [`DeviceCapabilities`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub is_low_end: bool,
    pub is_touch_primary: bool,
    pub has_high_dpi: bool,
    pub minimum_contrast_ratio: f64,
    pub scrollback_rows: usize,
}

impl DeviceProfile {
    pub fn classify(caps: &DeviceCapabilities) -> Self {
        let few_cores = caps
            .hardware_concurrency
            .is_some_and(|cores| cores <= LOW_END_MAX_CORES);
        let little_memory = caps
            .device_memory_gib
            .is_some_and(|gib| gib <= LOW_END_MAX_MEMORY_GIB);

        let is_low_end = few_cores || little_memory;
        let is_touch_primary = caps.max_touch_points > 0;

        let scrollback_rows = if is_low_end {
            500
        } else if is_touch_primary {
            1000
        } else {
            2000
        };

        Self {
            is_low_end,
            is_touch_primary,
            has_high_dpi: caps.device_pixel_ratio >= HIGH_DPI_RATIO,
            minimum_contrast_ratio: if is_low_end { 1.5 } else { 1.0 },
            scrollback_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_phone_is_low_end() {
        let profile = DeviceProfile::classify(&DeviceCapabilities {
            hardware_concurrency: Some(2),
            device_memory_gib: Some(1.0),
            max_touch_points: 5,
            device_pixel_ratio: 1.0,
        });

        assert!(profile.is_low_end);
        assert!(profile.is_touch_primary);
        assert!(!profile.has_high_dpi);
        assert_eq!(profile.minimum_contrast_ratio, 1.5);
        assert_eq!(profile.scrollback_rows, 500);
    }

    #[test]
    fn low_memory_alone_is_enough() {
        let profile = DeviceProfile::classify(&DeviceCapabilities {
            hardware_concurrency: Some(8),
            device_memory_gib: Some(2.0),
            ..Default::default()
        });
        assert!(profile.is_low_end);
    }

    #[test]
    fn capable_devices_keep_more_scrollback() {
        let phone = DeviceProfile::classify(&DeviceCapabilities {
            hardware_concurrency: Some(8),
            device_memory_gib: Some(8.0),
            max_touch_points: 5,
            device_pixel_ratio: 3.0,
        });
        assert!(!phone.is_low_end);
        assert!(phone.has_high_dpi);
        assert_eq!(phone.scrollback_rows, 1000);

        let desktop = DeviceProfile::classify(&DeviceCapabilities {
            hardware_concurrency: Some(8),
            ..Default::default()
        });
        assert_eq!(desktop.minimum_contrast_ratio, 1.0);
        assert_eq!(desktop.scrollback_rows, 2000);
    }

    #[test]
    fn unknown_readings_are_not_low_end() {
        assert!(!DeviceProfile::classify(&DeviceCapabilities::default()).is_low_end);
    }
}
