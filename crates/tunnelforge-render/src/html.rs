use std::fmt::Write;

use tunnelforge_types::{Cell, CellAttributes};

use crate::contrast::{self, Rgb};
use crate::{Frame, RowWindow};

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn css_color(color: u32) -> String {
    if color <= 255 {
        format!("var(--terminal-color-{color})")
    } else {
        format!(
            "rgb({},{},{})",
            (color >> 16) & 0xff,
            (color >> 8) & 0xff,
            color & 0xff
        )
    }
}

/// Foreground replacing `fg` so it stays readable on `bg`, when both have
/// fixed RGB values.
fn contrasted(fg: Option<u32>, bg: Option<u32>, min_contrast: f64) -> Option<Rgb> {
    if min_contrast <= 1.0 {
        return None;
    }
    let fg = contrast::resolve(fg?)?;
    let bg = contrast::resolve(bg?)?;
    contrast::adjust_foreground(fg, bg, min_contrast)
}

/// Opening tag for a run of cells styled like `cell`, or `None` when the
/// run needs no span.
fn span_open(cell: &Cell, is_cursor: bool, min_contrast: f64) -> Option<String> {
    let attrs = cell.attributes;
    let mut classes: Vec<&str> = attrs
        .names()
        .filter(|name| *name != "inverse")
        .collect();
    if is_cursor {
        classes.push("cursor");
    }

    let inverse = attrs.contains(CellAttributes::INVERSE);
    let (fg, bg) = if inverse {
        (cell.bg, cell.fg)
    } else {
        (cell.fg, cell.bg)
    };

    let fg_css = match contrasted(fg, bg, min_contrast) {
        Some((r, g, b)) => Some(format!("rgb({r},{g},{b})")),
        None => fg
            .map(css_color)
            .or_else(|| inverse.then(|| "var(--terminal-background)".to_string())),
    };
    let bg_css = bg
        .map(css_color)
        .or_else(|| inverse.then(|| "var(--terminal-foreground)".to_string()));

    let mut style = String::new();
    if let Some(fg) = fg_css {
        let _ = write!(style, "color: {fg};");
    }
    if let Some(bg) = bg_css {
        let _ = write!(style, "background-color: {bg};");
    }

    if classes.is_empty() && style.is_empty() {
        return None;
    }

    let mut tag = String::from("<span");
    if !classes.is_empty() {
        let _ = write!(tag, " class=\"{}\"", classes.join(" "));
    }
    if !style.is_empty() {
        let _ = write!(tag, " style=\"{style}\"");
    }
    tag.push('>');
    Some(tag)
}

fn flush_run(html: &mut String, run: Option<(&Cell, bool)>, text: &mut String, min_contrast: f64) {
    if let Some((cell, is_cursor)) = run {
        match span_open(cell, is_cursor, min_contrast) {
            Some(open) => {
                let _ = write!(html, "{open}{}</span>", escape_html(text));
            }
            None => html.push_str(&escape_html(text)),
        }
    }
    text.clear();
}

/// Render one row. Runs of identically styled cells share a span; the
/// cursor cell always gets its own.
pub fn render_line_html(cells: &[Cell], cursor_col: Option<usize>) -> String {
    line_html(cells, cursor_col, 1.0)
}

fn line_html(cells: &[Cell], cursor_col: Option<usize>, min_contrast: f64) -> String {
    let mut html = String::new();
    let mut run: Option<(&Cell, bool)> = None;
    let mut text = String::new();

    for (col, cell) in cells.iter().enumerate() {
        if cell.is_continuation() {
            continue;
        }
        let is_cursor = cursor_col == Some(col);
        let continues = matches!(run, Some((prev, prev_cursor))
            if !is_cursor && !prev_cursor && prev.same_style(cell));
        if !continues {
            flush_run(&mut html, run, &mut text, min_contrast);
            run = Some((cell, is_cursor));
        }
        if cell.character.is_empty() {
            text.push(' ');
        } else {
            text.push_str(&cell.character);
        }
    }
    flush_run(&mut html, run, &mut text, min_contrast);

    // A cursor parked past the end of the row still needs to show.
    if let Some(col) = cursor_col {
        if col >= cells.len() {
            html.push_str("<span class=\"cursor\"> </span>");
        }
    }

    html
}

/// Render a whole frame as the container's inner HTML.
pub fn render_frame_html(frame: &Frame) -> String {
    let line_height = frame.geometry.line_height_px;
    let mut html = String::new();

    if let RowWindow::Virtual {
        offset_px,
        total_height_px,
        ..
    } = frame.window
    {
        let _ = write!(
            html,
            "<div style=\"height: {total_height_px}px; position: relative;\">\
             <div style=\"transform: translateY({offset_px}px);\">"
        );
    }

    for (index, row) in frame.rows() {
        let content = line_html(row, frame.cursor_column(index), frame.minimum_contrast_ratio);
        let _ = write!(
            html,
            "<div class=\"terminal-line\" style=\"height: {line_height}px; line-height: {line_height}px;\" data-row=\"{index}\">{content}</div>"
        );
    }

    if frame.window.is_virtual() {
        html.push_str("</div></div>");
    }
    html
}
