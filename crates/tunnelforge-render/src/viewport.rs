use std::ops::Range;

use crate::RenderConfig;

/// Which rows of a buffer get materialized.
#[derive(Debug, Clone, PartialEq)]
pub enum RowWindow {
    /// Small buffer: every row is rendered directly.
    Full { rows: usize },
    /// Large buffer: only `start..end` is rendered, shifted down by
    /// `offset_px` inside a spacer `total_height_px` tall.
    Virtual {
        start: usize,
        end: usize,
        offset_px: f64,
        total_height_px: f64,
    },
}

impl RowWindow {
    pub fn range(&self) -> Range<usize> {
        match *self {
            RowWindow::Full { rows } => 0..rows,
            RowWindow::Virtual { start, end, .. } => start..end,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, RowWindow::Virtual { .. })
    }

    pub fn rendered_rows(&self) -> usize {
        self.range().len()
    }
}

/// Decide the rendered slice for a buffer of `total_rows` scrolled to
/// `scroll_top_px` inside a container `container_height_px` tall.
pub fn compute_window(
    total_rows: usize,
    scroll_top_px: f64,
    container_height_px: f64,
    line_height_px: f64,
    config: &RenderConfig,
) -> RowWindow {
    if total_rows <= config.virtualize_above_rows || line_height_px <= 0.0 {
        return RowWindow::Full { rows: total_rows };
    }

    let visible_rows = (container_height_px.max(0.0) / line_height_px).ceil() as usize;
    let scroll_position = scroll_top_px.max(0.0) / line_height_px;
    let padding = config.virtual_padding_rows.min(visible_rows);

    let start = (scroll_position.floor() as usize)
        .saturating_sub(padding)
        .min(total_rows);
    let end = ((scroll_position + visible_rows as f64).ceil() as usize + padding).min(total_rows);

    RowWindow::Virtual {
        start,
        end: end.max(start),
        offset_px: start as f64 * line_height_px,
        total_height_px: total_rows as f64 * line_height_px,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: f64 = 20.0;

    #[test]
    fn small_buffers_render_everything() {
        let config = RenderConfig::default();
        let window = compute_window(99, 600.0, 400.0, LINE, &config);
        assert_eq!(window, RowWindow::Full { rows: 99 });
        assert_eq!(window.range(), 0..99);

        // The threshold itself is not virtualized.
        assert!(!compute_window(100, 0.0, 400.0, LINE, &config).is_virtual());
    }

    #[test]
    fn large_buffers_render_only_the_padded_viewport() {
        let config = RenderConfig::default();
        let scroll_row = 40;
        let visible_rows = 20;
        let window = compute_window(
            101,
            scroll_row as f64 * LINE,
            visible_rows as f64 * LINE,
            LINE,
            &config,
        );

        assert!(window.is_virtual());
        let range = window.range();
        assert_eq!(range, 30..70);
        assert!(range.start >= scroll_row - 10);
        assert!(range.end <= scroll_row + visible_rows + 10);

        match window {
            RowWindow::Virtual {
                offset_px,
                total_height_px,
                ..
            } => {
                assert_eq!(offset_px, 600.0);
                assert_eq!(total_height_px, 2020.0);
            }
            RowWindow::Full { .. } => unreachable!(),
        }
    }

    #[test]
    fn window_is_clamped_at_both_ends() {
        let config = RenderConfig::default();
        assert_eq!(compute_window(500, 0.0, 200.0, LINE, &config).range(), 0..20);
        assert_eq!(
            compute_window(500, 495.0 * LINE, 200.0, LINE, &config).range(),
            485..500
        );
    }

    #[test]
    fn padding_never_exceeds_visible_rows() {
        let config = RenderConfig::default();
        // Three visible rows means three rows of padding, not ten.
        let window = compute_window(300, 100.0 * LINE, 3.0 * LINE, LINE, &config);
        assert_eq!(window.range(), 97..106);
    }
}
