use tunnelforge_render::{render_frame_html, Frame, Painter};
use wasm_bindgen::JsValue;
use web_sys::HtmlElement;

use crate::dom;

/// Paints frames into a container element as HTML rows.
pub struct DomPainter {
    container: HtmlElement,
}

impl DomPainter {
    pub fn new(container: HtmlElement) -> Self {
        Self { container }
    }

    pub fn clear(&self) {
        self.container.set_inner_html("");
    }

    /// Tell listeners on the container (scroll-to-bottom, search) that the
    /// painted rows changed.
    pub fn notify_content_changed(&self) -> Result<(), JsValue> {
        dom::dispatch(self.container.as_ref(), "content-changed")
    }
}

impl Painter for DomPainter {
    fn paint(&mut self, frame: &Frame) {
        let style = self.container.style();
        let _ = style.set_property("font-size", &format!("{}px", frame.geometry.font_size_px));
        let _ = style.set_property(
            "line-height",
            &format!("{}px", frame.geometry.line_height_px),
        );
        self.container.set_inner_html(&render_frame_html(frame));
    }
}
