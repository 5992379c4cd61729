use tunnelforge_types::{BufferSnapshot, Cell, CellAttributes};

/// Palette index or packed RGB. Truecolour values that fit in a byte are
/// indistinguishable from palette indices on the wire.
fn color_value(color: vt100::Color) -> Option<u32> {
    match color {
        vt100::Color::Default => None,
        vt100::Color::Idx(idx) => Some(u32::from(idx)),
        vt100::Color::Rgb(r, g, b) => {
            Some((u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b))
        }
    }
}

fn convert_cell(cell: &vt100::Cell) -> Cell {
    let mut attributes = CellAttributes::empty();
    if cell.bold() {
        attributes.insert(CellAttributes::BOLD);
    }
    if cell.italic() {
        attributes.insert(CellAttributes::ITALIC);
    }
    if cell.underline() {
        attributes.insert(CellAttributes::UNDERLINE);
    }
    if cell.inverse() {
        attributes.insert(CellAttributes::INVERSE);
    }

    let (character, width) = if cell.is_wide_continuation() {
        (String::new(), 0)
    } else if cell.has_contents() {
        (cell.contents(), if cell.is_wide() { 2 } else { 1 })
    } else {
        (" ".to_string(), 1)
    };

    Cell {
        character,
        width,
        fg: color_value(cell.fgcolor()),
        bg: color_value(cell.bgcolor()),
        attributes,
    }
}

/// Capture the visible rows of an emulator screen.
///
/// `viewport_y` is reported as-is so callers can carry their own notion of
/// scroll position.
pub fn grid_from_screen(screen: &vt100::Screen, viewport_y: u32) -> BufferSnapshot {
    let (rows, cols) = screen.size();
    let (cursor_row, cursor_col) = screen.cursor_position();

    let cells = (0..rows)
        .map(|row| {
            (0..cols)
                .map(|col| screen.cell(row, col).map(convert_cell).unwrap_or_default())
                .collect()
        })
        .collect();

    BufferSnapshot {
        cols,
        rows,
        viewport_y,
        cursor_x: cursor_col,
        cursor_y: cursor_row,
        cells,
    }
}
