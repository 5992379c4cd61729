use vt100::Parser;

use super::DEFAULT_SCROLLBACK_LINES;
use crate::grid::grid_from_screen;
use tunnelforge_types::BufferSnapshot;

/// Emulator state for one session, able to produce snapshots on demand.
pub struct ScreenBuffer {
    parser: Parser,
    cols: u16,
    rows: u16,
    generation: u64,
}

impl ScreenBuffer {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_scrollback(cols, rows, DEFAULT_SCROLLBACK_LINES)
    }

    pub fn with_scrollback(cols: u16, rows: u16, scrollback: usize) -> Self {
        Self {
            parser: Parser::new(rows, cols, scrollback),
            cols,
            rows,
            generation: 0,
        }
    }

    /// Feed raw PTY output.
    pub fn process_output(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.parser.process(data);
        self.generation += 1;
    }

    /// Incremented on every change that could alter a snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cursor position as (col, row).
    pub fn cursor_position(&self) -> (u16, u16) {
        let (row, col) = self.parser.screen().cursor_position();
        (col, row)
    }

    /// Terminal size as (cols, rows).
    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Resize in place, keeping existing content where it still fits.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if (cols, rows) == (self.cols, self.rows) {
            return;
        }
        self.cols = cols;
        self.rows = rows;
        self.parser.set_size(rows, cols);
        self.generation += 1;
    }

    /// Scroll the view `offset` lines back into history.
    pub fn scroll_to(&mut self, offset: usize) {
        self.parser.set_scrollback(offset);
        self.generation += 1;
    }

    /// Current scrollback offset (0 means following live output).
    pub fn scroll_offset(&self) -> usize {
        self.parser.screen().scrollback()
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        grid_from_screen(self.parser.screen(), self.scroll_offset() as u32)
    }

    pub fn screen(&self) -> &vt100::Screen {
        self.parser.screen()
    }
}
