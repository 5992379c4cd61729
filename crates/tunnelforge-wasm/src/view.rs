//! One terminal surface: a subscription painted into a container element.

use std::sync::Arc;

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::future::Fuse;
use futures::{select, FutureExt, StreamExt};
use gloo_timers::future::TimeoutFuture;
use tunnelforge_render::{Debouncer, DeviceProfile, FontMetrics, RenderConfig, RenderEngine};
use tunnelforge_types::{BufferSnapshot, SessionStatus};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{EventTarget, HtmlElement};

use crate::dom::{content_size, measure_char_width, Listener};
use crate::painter::DomPainter;
use crate::socket::SocketSubscription;
use crate::utils::{now, timeout_millis};

pub(crate) enum ViewEvent {
    Touch,
    Resize { width: f64, height: f64 },
    Scroll { top_px: f64 },
    Status(SessionStatus),
    Metrics(FontMetrics),
    Detach,
}

/// Handle to an attached terminal. Dropping or detaching it unsubscribes
/// and removes its listeners.
#[wasm_bindgen]
pub struct TerminalView {
    session_id: String,
    events: UnboundedSender<ViewEvent>,
    listeners: Vec<Listener>,
}

#[wasm_bindgen]
impl TerminalView {
    #[wasm_bindgen(getter, js_name = sessionId)]
    pub fn session_id(&self) -> String {
        self.session_id.clone()
    }

    /// Session status as the backend reports it: `running`, `exited`, ...
    /// The cursor is hidden for anything but `running`.
    #[wasm_bindgen(js_name = setStatus)]
    pub fn set_status(&self, status: &str) -> Result<(), JsValue> {
        let status: SessionStatus =
            serde_json::from_value(serde_json::Value::String(status.to_string()))
                .map_err(|_| JsValue::from_str(&format!("Unknown session status: {status}")))?;
        let _ = self.events.unbounded_send(ViewEvent::Status(status));
        Ok(())
    }

    /// Measured advance of one glyph at the 14px reference size.
    #[wasm_bindgen(js_name = setCharWidth)]
    pub fn set_char_width(&self, px: f64) {
        if px > 0.0 {
            let _ = self
                .events
                .unbounded_send(ViewEvent::Metrics(FontMetrics::new(px)));
        }
    }

    pub fn detach(&mut self) {
        self.listeners.clear();
        let _ = self.events.unbounded_send(ViewEvent::Detach);
    }
}

impl Drop for TerminalView {
    fn drop(&mut self) {
        self.detach();
    }
}

impl TerminalView {
    pub(crate) fn attach(
        subscription: SocketSubscription,
        container: HtmlElement,
        profile: &DeviceProfile,
    ) -> Result<Self, JsValue> {
        let session_id = subscription.session_id().to_string();
        let (events, receiver) = unbounded();

        let metrics = container
            .owner_document()
            .and_then(|document| measure_char_width(&document, &container))
            .map(FontMetrics::new)
            .unwrap_or_else(FontMetrics::approximate);
        let mut engine = RenderEngine::new(RenderConfig::for_device(profile), metrics);
        let (width, height) = content_size(&container);
        engine.set_container(width, height);

        let listeners = listen(&container, &events)?;
        let debouncer = Debouncer::new(engine.config().debounce.clone(), profile.is_touch_primary);
        let painter = DomPainter::new(container);

        wasm_bindgen_futures::spawn_local(paint_loop(
            subscription,
            engine,
            debouncer,
            painter,
            receiver,
        ));

        log::info!("attached terminal view for session {}", session_id);
        Ok(Self {
            session_id,
            events,
            listeners,
        })
    }
}

fn listen(
    container: &HtmlElement,
    events: &UnboundedSender<ViewEvent>,
) -> Result<Vec<Listener>, JsValue> {
    let target: &EventTarget = container.as_ref();
    let mut listeners = Vec::with_capacity(3);

    let tx = events.clone();
    listeners.push(Listener::passive(target, "touchstart", move |_| {
        let _ = tx.unbounded_send(ViewEvent::Touch);
    })?);

    let tx = events.clone();
    listeners.push(Listener::passive(target, "scroll", move |event| {
        if let Some(element) = event
            .current_target()
            .and_then(|t| t.dyn_into::<HtmlElement>().ok())
        {
            let top_px = f64::from(element.scroll_top());
            let _ = tx.unbounded_send(ViewEvent::Scroll { top_px });
        }
    })?);

    if let Some(window) = web_sys::window() {
        let tx = events.clone();
        let observed = container.clone();
        listeners.push(Listener::passive(window.as_ref(), "resize", move |_| {
            let (width, height) = content_size(&observed);
            let _ = tx.unbounded_send(ViewEvent::Resize { width, height });
        })?);
    }

    Ok(listeners)
}

fn timer_until(deadline: Option<std::time::Duration>) -> Fuse<TimeoutFuture> {
    match deadline {
        Some(deadline) => {
            TimeoutFuture::new(timeout_millis(deadline.saturating_sub(now()))).fuse()
        }
        None => Fuse::terminated(),
    }
}

async fn paint_loop(
    subscription: SocketSubscription,
    mut engine: RenderEngine,
    mut debouncer: Debouncer<Arc<BufferSnapshot>>,
    mut painter: DomPainter,
    events: UnboundedReceiver<ViewEvent>,
) {
    let mut snapshots = subscription.fuse();
    let mut events = events.fuse();
    let mut stream_open = true;

    while stream_open || debouncer.has_pending() {
        let mut timer = timer_until(debouncer.deadline());

        select! {
            item = snapshots.next() => match item {
                Some(snapshot) => {
                    debouncer.push(snapshot, now());
                }
                None => stream_open = false,
            },
            event = events.next() => {
                let at = now();
                let view_changed = match event {
                    Some(ViewEvent::Touch) => {
                        debouncer.record_touch(at);
                        false
                    }
                    Some(ViewEvent::Resize { width, height }) => {
                        engine.set_container(width, height);
                        true
                    }
                    Some(ViewEvent::Scroll { top_px }) => {
                        engine.set_scroll_top(top_px);
                        true
                    }
                    Some(ViewEvent::Status(status)) => {
                        engine.set_status(status);
                        true
                    }
                    Some(ViewEvent::Metrics(metrics)) => {
                        engine.set_metrics(metrics);
                        true
                    }
                    Some(ViewEvent::Detach) | None => {
                        painter.clear();
                        break;
                    }
                };
                if view_changed && !debouncer.has_pending() {
                    if let Some(last) = engine.last_snapshot() {
                        debouncer.push(last, at);
                    }
                }
            },
            _ = timer => {
                if let Some(snapshot) = debouncer.fire(now()) {
                    let outcome = engine.render(snapshot, &mut painter);
                    if outcome.content_changed {
                        log::trace!("content changed, {} rows painted", outcome.rows_painted);
                        if let Err(err) = painter.notify_content_changed() {
                            log::warn!("content-changed dispatch failed: {:?}", err);
                        }
                    }
                }
            },
        }
    }

    debouncer.cancel();
    log::debug!("terminal view loop finished");
}
