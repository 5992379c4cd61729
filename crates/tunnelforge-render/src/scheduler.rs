//! Tokio paint loop: snapshots in, debounced paints out.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;
use tunnelforge_types::{BufferSnapshot, SessionStatus};

use crate::{Debouncer, FontMetrics, Painter, RenderEngine};

/// Notifications for the surrounding UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    Painted { rows: usize },
    /// The painted text or styling differs from the previous paint.
    ContentChanged,
}

enum Control {
    Touch,
    Resize { width: f64, height: f64 },
    Scroll { top_px: f64 },
    Status(SessionStatus),
    Metrics(FontMetrics),
}

/// Feeds view changes into a running paint loop.
#[derive(Clone)]
pub struct PaintHandle {
    control: mpsc::UnboundedSender<Control>,
}

impl PaintHandle {
    /// Record a touch interaction, lengthening the next debounce on touch
    /// devices.
    pub fn touch(&self) {
        let _ = self.control.send(Control::Touch);
    }

    pub fn resize(&self, width: f64, height: f64) {
        let _ = self.control.send(Control::Resize { width, height });
    }

    pub fn scroll_to(&self, top_px: f64) {
        let _ = self.control.send(Control::Scroll { top_px });
    }

    pub fn set_status(&self, status: SessionStatus) {
        let _ = self.control.send(Control::Status(status));
    }

    pub fn set_metrics(&self, metrics: FontMetrics) {
        let _ = self.control.send(Control::Metrics(metrics));
    }
}

/// Spawn a task that paints `snapshots` through `painter` with adaptive
/// debouncing. The task ends once the stream ends and any pending snapshot
/// has been painted; it returns the painter.
pub fn spawn_paint_loop<S, P>(
    snapshots: S,
    engine: RenderEngine,
    painter: P,
    touch_primary: bool,
) -> (PaintHandle, mpsc::UnboundedReceiver<RenderEvent>, JoinHandle<P>)
where
    S: Stream<Item = Arc<BufferSnapshot>> + Unpin + Send + 'static,
    P: Painter + Send + 'static,
{
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(paint_loop(
        snapshots,
        engine,
        painter,
        touch_primary,
        control_rx,
        events_tx,
    ));

    (PaintHandle { control: control_tx }, events_rx, task)
}

async fn paint_loop<S, P>(
    mut snapshots: S,
    mut engine: RenderEngine,
    mut painter: P,
    touch_primary: bool,
    mut control: mpsc::UnboundedReceiver<Control>,
    events: mpsc::UnboundedSender<RenderEvent>,
) -> P
where
    S: Stream<Item = Arc<BufferSnapshot>> + Unpin,
    P: Painter,
{
    let origin = Instant::now();
    let mut debouncer = Debouncer::new(engine.config().debounce.clone(), touch_primary);
    let mut stream_open = true;

    while stream_open || debouncer.has_pending() {
        let deadline = debouncer.deadline().map(|offset| origin + offset);

        tokio::select! {
            item = snapshots.next(), if stream_open => match item {
                Some(snapshot) => {
                    debouncer.push(snapshot, origin.elapsed());
                }
                None => stream_open = false,
            },
            Some(command) = control.recv() => {
                let now = origin.elapsed();
                let view_changed = match command {
                    Control::Touch => {
                        debouncer.record_touch(now);
                        false
                    }
                    Control::Resize { width, height } => {
                        engine.set_container(width, height);
                        true
                    }
                    Control::Scroll { top_px } => {
                        engine.set_scroll_top(top_px);
                        true
                    }
                    Control::Status(status) => {
                        engine.set_status(status);
                        true
                    }
                    Control::Metrics(metrics) => {
                        engine.set_metrics(metrics);
                        true
                    }
                };
                // Repaint the last snapshot under the new view unless a newer
                // one is already waiting.
                if view_changed && !debouncer.has_pending() {
                    if let Some(last) = engine.last_snapshot() {
                        debouncer.push(last, now);
                    }
                }
            }
            _ = sleep_until(deadline.unwrap_or(origin)), if deadline.is_some() => {
                if let Some(snapshot) = debouncer.fire(origin.elapsed()) {
                    let outcome = engine.render(snapshot, &mut painter);
                    if outcome.painted {
                        let _ = events.send(RenderEvent::Painted { rows: outcome.rows_painted });
                    }
                    if outcome.content_changed {
                        debug!(target: "render", "content changed");
                        let _ = events.send(RenderEvent::ContentChanged);
                    }
                }
            }
            else => break,
        }
    }

    painter
}
