use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ProtocolError;

// ============================================================================
// Cell attributes
// ============================================================================

/// Style bits carried by a single cell, serialized as a plain integer mask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellAttributes(u8);

impl CellAttributes {
    pub const BOLD: Self = Self(0x01);
    pub const DIM: Self = Self(0x02);
    pub const ITALIC: Self = Self(0x04);
    pub const UNDERLINE: Self = Self(0x08);
    pub const INVERSE: Self = Self(0x10);
    pub const INVISIBLE: Self = Self(0x20);
    pub const STRIKETHROUGH: Self = Self(0x40);

    const NAMES: [(Self, &'static str); 7] = [
        (Self::BOLD, "bold"),
        (Self::DIM, "dim"),
        (Self::ITALIC, "italic"),
        (Self::UNDERLINE, "underline"),
        (Self::INVERSE, "inverse"),
        (Self::INVISIBLE, "invisible"),
        (Self::STRIKETHROUGH, "strikethrough"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Names of the set flags, lowest bit first.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl fmt::Debug for CellAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl std::ops::BitOr for CellAttributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

// ============================================================================
// Cell
// ============================================================================

fn default_width() -> u8 {
    1
}

fn is_default_width(width: &u8) -> bool {
    *width == 1
}

/// One grid position.
///
/// Colours below 256 are palette indices, anything larger is a packed
/// `0xRRGGBB` value. A wide glyph occupies its own cell with width 2 and is
/// followed by a continuation cell with an empty character and width 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(rename = "char", default)]
    pub character: String,

    #[serde(default = "default_width", skip_serializing_if = "is_default_width")]
    pub width: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg: Option<u32>,

    #[serde(default, skip_serializing_if = "CellAttributes::is_empty")]
    pub attributes: CellAttributes,
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank()
    }
}

impl Cell {
    /// A single space with no styling.
    pub fn blank() -> Self {
        Self {
            character: " ".to_string(),
            width: 1,
            fg: None,
            bg: None,
            attributes: CellAttributes::empty(),
        }
    }

    pub fn new(character: impl Into<String>) -> Self {
        Self {
            character: character.into(),
            ..Self::blank()
        }
    }

    pub fn with_fg(mut self, fg: u32) -> Self {
        self.fg = Some(fg);
        self
    }

    pub fn with_bg(mut self, bg: u32) -> Self {
        self.bg = Some(bg);
        self
    }

    pub fn with_attributes(mut self, attributes: CellAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// True for the trailing half of a wide glyph.
    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// Whether two cells would be drawn with identical styling.
    pub fn same_style(&self, other: &Cell) -> bool {
        self.fg == other.fg && self.bg == other.bg && self.attributes == other.attributes
    }

    pub fn is_styled(&self) -> bool {
        self.fg.is_some() || self.bg.is_some() || !self.attributes.is_empty()
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Full-state view of one session's grid at one instant.
///
/// A snapshot always replaces whatever the receiver held before; there is no
/// delta encoding on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferSnapshot {
    pub cols: u16,
    pub rows: u16,
    #[serde(default)]
    pub viewport_y: u32,
    pub cursor_x: u16,
    pub cursor_y: u16,
    #[serde(default)]
    pub cells: Vec<Vec<Cell>>,
}

impl BufferSnapshot {
    /// A grid of blank cells with the cursor at the origin.
    pub fn blank(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            viewport_y: 0,
            cursor_x: 0,
            cursor_y: 0,
            cells: vec![vec![Cell::blank(); cols as usize]; rows as usize],
        }
    }

    /// Build a snapshot from plain text lines, padding nothing.
    pub fn from_lines<S: AsRef<str>>(cols: u16, lines: &[S]) -> Self {
        let cells: Vec<Vec<Cell>> = lines
            .iter()
            .map(|line| {
                line.as_ref()
                    .chars()
                    .take(cols as usize)
                    .map(|c| Cell::new(c.to_string()))
                    .collect()
            })
            .collect();

        Self {
            cols,
            rows: cells.len() as u16,
            cells,
            ..Default::default()
        }
    }

    pub fn with_cursor(mut self, x: u16, y: u16) -> Self {
        self.cursor_x = x;
        self.cursor_y = y;
        self
    }

    /// Number of rows actually carried, which may exceed `rows` when the
    /// backend includes scrollback.
    pub fn total_rows(&self) -> usize {
        self.cells.len()
    }

    /// Whether every declared row is present.
    pub fn is_complete(&self) -> bool {
        self.cells.len() >= self.rows as usize
    }

    /// Check that no row is wider than the grid.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        for (row, line) in self.cells.iter().enumerate() {
            if line.len() > self.cols as usize {
                return Err(ProtocolError::RowTooWide {
                    row,
                    width: line.len(),
                    cols: self.cols,
                });
            }
        }
        Ok(())
    }
}
