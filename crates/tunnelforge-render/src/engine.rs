use std::sync::Arc;

use tracing::trace;
use tunnelforge_types::{BufferSnapshot, Cell, SessionStatus};

use crate::geometry::{derive_geometry, FontMetrics, Geometry};
use crate::viewport::{compute_window, RowWindow};
use crate::{ContentChangeDetector, RenderConfig};

/// Everything a painter needs to draw one snapshot.
#[derive(Debug, Clone)]
pub struct Frame {
    pub snapshot: Arc<BufferSnapshot>,
    pub geometry: Geometry,
    pub window: RowWindow,
    /// Cursor as (column, row), present only for running sessions.
    pub cursor: Option<(usize, usize)>,
    pub minimum_contrast_ratio: f64,
}

impl Frame {
    /// Rows inside the render window with their absolute index.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[Cell])> + '_ {
        self.window
            .range()
            .filter_map(move |index| self.snapshot.cells.get(index).map(|row| (index, row.as_slice())))
    }

    /// Column to highlight on `row`, if the cursor is there.
    pub fn cursor_column(&self, row: usize) -> Option<usize> {
        self.cursor
            .and_then(|(col, cursor_row)| (cursor_row == row).then_some(col))
    }
}

/// Output surface for frames: a DOM container, a string buffer, a test
/// recorder.
pub trait Painter {
    fn paint(&mut self, frame: &Frame);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaintOutcome {
    pub painted: bool,
    pub rows_painted: usize,
    pub content_changed: bool,
}

/// Cursor position to draw, honouring session status.
pub fn cursor_for(snapshot: &BufferSnapshot, status: SessionStatus) -> Option<(usize, usize)> {
    status
        .is_running()
        .then_some((snapshot.cursor_x as usize, snapshot.cursor_y as usize))
}

/// Keep at most `limit` rows from the end of the buffer. Returns the
/// snapshot to draw and how many leading rows were dropped.
pub fn retain_scrollback(
    snapshot: Arc<BufferSnapshot>,
    limit: Option<usize>,
) -> (Arc<BufferSnapshot>, usize) {
    let total = snapshot.total_rows();
    let Some(limit) = limit.filter(|limit| total > *limit) else {
        return (snapshot, 0);
    };

    let dropped = total - limit;
    let trimmed = BufferSnapshot {
        cols: snapshot.cols,
        rows: snapshot.rows,
        viewport_y: snapshot
            .viewport_y
            .saturating_sub(u32::try_from(dropped).unwrap_or(u32::MAX)),
        cursor_x: snapshot.cursor_x,
        cursor_y: snapshot
            .cursor_y
            .saturating_sub(u16::try_from(dropped).unwrap_or(u16::MAX)),
        cells: snapshot.cells[dropped..].to_vec(),
    };
    (Arc::new(trimmed), dropped)
}

/// Holds the view state of one terminal surface and turns snapshots into
/// frames.
#[derive(Debug)]
pub struct RenderEngine {
    config: RenderConfig,
    metrics: FontMetrics,
    container_width: f64,
    container_height: f64,
    scroll_top_px: f64,
    status: SessionStatus,
    detector: ContentChangeDetector,
    last: Option<Arc<BufferSnapshot>>,
}

impl RenderEngine {
    pub fn new(config: RenderConfig, metrics: FontMetrics) -> Self {
        Self {
            config,
            metrics,
            container_width: 0.0,
            container_height: 0.0,
            scroll_top_px: 0.0,
            status: SessionStatus::Running,
            detector: ContentChangeDetector::new(),
            last: None,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn set_container(&mut self, width: f64, height: f64) {
        self.container_width = width;
        self.container_height = height;
    }

    pub fn set_metrics(&mut self, metrics: FontMetrics) {
        self.metrics = metrics;
    }

    pub fn set_scroll_top(&mut self, scroll_top_px: f64) {
        self.scroll_top_px = scroll_top_px.max(0.0);
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Snapshot most recently handed to [`render`](Self::render).
    pub fn last_snapshot(&self) -> Option<Arc<BufferSnapshot>> {
        self.last.clone()
    }

    pub fn geometry_for(&self, cols: u16) -> Geometry {
        derive_geometry(
            self.container_width,
            self.container_height,
            cols,
            self.metrics,
            &self.config,
        )
    }

    pub fn frame(&self, snapshot: Arc<BufferSnapshot>) -> Frame {
        // A cursor inside the dropped rows is not drawn.
        let cursor = cursor_for(&snapshot, self.status);
        let (snapshot, dropped) = retain_scrollback(snapshot, self.config.scrollback_rows);
        let cursor = cursor.and_then(|(col, row)| row.checked_sub(dropped).map(|row| (col, row)));

        let geometry = self.geometry_for(snapshot.cols);
        let window = compute_window(
            snapshot.total_rows(),
            self.scroll_top_px,
            self.container_height,
            geometry.line_height_px,
            &self.config,
        );

        Frame {
            snapshot,
            geometry,
            window,
            cursor,
            minimum_contrast_ratio: self.config.minimum_contrast_ratio,
        }
    }

    /// Paint `snapshot` and run change detection on what was painted.
    ///
    /// Nothing is painted while the container has no room for a row.
    pub fn render<P: Painter + ?Sized>(
        &mut self,
        snapshot: Arc<BufferSnapshot>,
        painter: &mut P,
    ) -> PaintOutcome {
        self.last = Some(Arc::clone(&snapshot));

        let frame = self.frame(snapshot);
        if frame.geometry.visible_rows == 0 {
            trace!(target: "render", "container has no visible rows, skipping paint");
            return PaintOutcome::default();
        }

        painter.paint(&frame);
        let content_changed = self.detector.observe(&frame.snapshot);

        PaintOutcome {
            painted: true,
            rows_painted: frame.window.rendered_rows(),
            content_changed,
        }
    }
}
