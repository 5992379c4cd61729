//! Cell grid model for tunnelforge.
//!
//! Escape-sequence interpretation is delegated to `vt100`; this crate turns
//! the emulator's screen into [`BufferSnapshot`]s and derives the styled text
//! form used for change detection.

pub mod grid;
pub mod screen_buffer;
pub mod text;

pub use grid::grid_from_screen;
pub use screen_buffer::ScreenBuffer;
pub use text::{cells_to_plain_text, cells_to_text, format_cell_style};

pub use tunnelforge_types::{BufferSnapshot, Cell, CellAttributes};

/// Default scrollback retained by a [`ScreenBuffer`].
pub const DEFAULT_SCROLLBACK_LINES: usize = 1000;
