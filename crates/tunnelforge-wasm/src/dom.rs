use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, EventTarget, HtmlElement};

use tunnelforge_render::geometry::REFERENCE_FONT_SIZE_PX;

/// Get element by ID
pub fn get_element_by_id(document: &Document, id: &str) -> Result<Element, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Element not found: {}", id)))
}

/// Get HTML element by ID
pub fn get_html_element_by_id(document: &Document, id: &str) -> Result<HtmlElement, JsValue> {
    let element = get_element_by_id(document, id)?;
    element
        .dyn_into::<HtmlElement>()
        .map_err(|_| JsValue::from_str(&format!("Element is not HtmlElement: {}", id)))
}

/// An event listener that is removed when dropped.
pub struct Listener {
    target: EventTarget,
    event: &'static str,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

impl Listener {
    /// Attach a passive listener so touch and scroll handling never blocks
    /// the browser's own scrolling.
    pub fn passive<F>(target: &EventTarget, event: &'static str, callback: F) -> Result<Self, JsValue>
    where
        F: FnMut(web_sys::Event) + 'static,
    {
        let closure = Closure::wrap(Box::new(callback) as Box<dyn FnMut(web_sys::Event)>);
        let options = web_sys::AddEventListenerOptions::new();
        options.set_passive(true);
        target.add_event_listener_with_callback_and_add_event_listener_options(
            event,
            closure.as_ref().unchecked_ref(),
            &options,
        )?;
        Ok(Self {
            target: target.clone(),
            event,
            closure,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.closure.as_ref().unchecked_ref());
    }
}

/// Set a `data-*` attribute
pub fn set_data(element: &HtmlElement, key: &str, value: &str) {
    let _ = element.dataset().set(key, value);
}

/// Inner size of an element in CSS pixels
pub fn content_size(element: &HtmlElement) -> (f64, f64) {
    (
        f64::from(element.client_width()),
        f64::from(element.client_height()),
    )
}

/// Width of one glyph at the reference font size, measured with a hidden
/// line inside `container` so it picks up the terminal's font. `None` when
/// the browser reports no layout, e.g. for a detached container.
pub fn measure_char_width(document: &Document, container: &HtmlElement) -> Option<f64> {
    const SAMPLE: usize = 100;

    let sample_line = document
        .create_element("div")
        .ok()?
        .dyn_into::<HtmlElement>()
        .ok()?;
    sample_line.set_class_name("terminal-line");
    let style = sample_line.style();
    let _ = style.set_property("position", "absolute");
    let _ = style.set_property("visibility", "hidden");
    let _ = style.set_property("white-space", "pre");
    let _ = style.set_property("font-size", &format!("{REFERENCE_FONT_SIZE_PX}px"));
    sample_line.set_text_content(Some(&"0".repeat(SAMPLE)));

    container.append_child(&sample_line).ok()?;
    let width = sample_line.get_bounding_client_rect().width();
    sample_line.remove();

    (width > 0.0).then(|| width / SAMPLE as f64)
}

/// Fire a bubbling `name` event with no detail on `target`.
pub fn dispatch(target: &EventTarget, name: &str) -> Result<(), JsValue> {
    let init = web_sys::CustomEventInit::new();
    init.set_bubbles(true);
    init.set_composed(true);
    let event = web_sys::CustomEvent::new_with_event_init_dict(name, &init)?;
    target.dispatch_event(&event)?;
    Ok(())
}
