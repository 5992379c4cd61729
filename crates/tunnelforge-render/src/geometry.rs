use crate::RenderConfig;

/// Font size the character width was measured at.
pub const REFERENCE_FONT_SIZE_PX: f64 = 14.0;

/// Measured width of one monospace glyph at [`REFERENCE_FONT_SIZE_PX`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub char_width_px: f64,
}

impl FontMetrics {
    pub fn new(char_width_px: f64) -> Self {
        Self { char_width_px }
    }

    /// Typical monospace advance of 0.6em, for when nothing was measured.
    pub fn approximate() -> Self {
        Self::new(REFERENCE_FONT_SIZE_PX * 0.6)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub font_size_px: f64,
    pub line_height_px: f64,
    pub visible_rows: usize,
}

/// Font size that makes `cols` glyphs exactly fill `width`, capped at the
/// configured maximum, and the number of whole rows that fit `height`.
pub fn derive_geometry(
    width: f64,
    height: f64,
    cols: u16,
    metrics: FontMetrics,
    config: &RenderConfig,
) -> Geometry {
    let cols = if cols == 0 { 80 } else { cols };
    let line_width_at_reference = metrics.char_width_px * f64::from(cols);

    let font_size_px = if line_width_at_reference > 0.0 && width > 0.0 {
        (width / line_width_at_reference * REFERENCE_FONT_SIZE_PX).min(config.max_font_size_px)
    } else {
        config.max_font_size_px
    };

    let line_height_px = font_size_px * config.line_height_factor;
    let visible_rows = if line_height_px > 0.0 && height > 0.0 {
        (height / line_height_px).floor() as usize
    } else {
        0
    };

    Geometry {
        font_size_px,
        line_height_px,
        visible_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn columns_fill_the_width_exactly() {
        let config = RenderConfig::default();
        // 80 columns at 8px each is 640px wide at 14px.
        let geometry = derive_geometry(960.0, 510.0, 80, FontMetrics::new(8.0), &config);

        assert!(approx(geometry.font_size_px, 21.0));
        assert!(approx(geometry.line_height_px, 25.2));
        assert_eq!(geometry.visible_rows, 20);
    }

    #[test]
    fn font_size_is_capped() {
        let config = RenderConfig::default();
        let geometry = derive_geometry(4000.0, 100.0, 20, FontMetrics::new(8.0), &config);

        assert!(approx(geometry.font_size_px, 32.0));
        assert_eq!(geometry.visible_rows, 2);
    }

    #[test]
    fn degenerate_sizes_do_not_divide_by_zero() {
        let config = RenderConfig::default();
        let geometry = derive_geometry(0.0, 0.0, 0, FontMetrics::approximate(), &config);
        assert_eq!(geometry.visible_rows, 0);
        assert!(geometry.font_size_px.is_finite());
    }
}
