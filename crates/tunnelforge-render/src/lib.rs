//! Adaptive rendering for terminal snapshots.
//!
//! The pieces are deliberately free of any UI toolkit: geometry and
//! virtualization are plain arithmetic, the debouncer is a state machine fed
//! with timestamps, and output goes through the [`Painter`] trait. The
//! browser crate and the native [`scheduler`] both drive the same engine.

pub mod change;
pub mod config;
pub mod contrast;
pub mod debounce;
pub mod device;
pub mod engine;
pub mod geometry;
pub mod html;
#[cfg(feature = "scheduler")]
pub mod scheduler;
pub mod viewport;

pub use change::ContentChangeDetector;
pub use config::{DebounceConfig, RenderConfig};
pub use debounce::Debouncer;
pub use device::{DeviceCapabilities, DeviceProfile};
pub use engine::{Frame, PaintOutcome, Painter, RenderEngine};
pub use geometry::{derive_geometry, FontMetrics, Geometry};
pub use html::{escape_html, render_frame_html, render_line_html};
#[cfg(feature = "scheduler")]
pub use scheduler::{spawn_paint_loop, PaintHandle, RenderEvent};
pub use viewport::{compute_window, RowWindow};
