use std::fmt::Write;

use tunnelforge_types::Cell;

fn push_color(out: &mut Vec<String>, key: &str, color: Option<u32>) {
    let Some(color) = color else { return };
    if color <= 255 {
        out.push(format!("{key}=\"{color}\""));
    } else {
        let (r, g, b) = ((color >> 16) & 0xff, (color >> 8) & 0xff, color & 0xff);
        out.push(format!("{key}=\"{r},{g},{b}\""));
    }
}

/// Style description of a cell, empty for unstyled cells.
///
/// Colours print as `fg="N"` for palette entries and `fg="r,g,b"` for
/// truecolour, followed by attribute names.
pub fn format_cell_style(cell: &Cell) -> String {
    let mut parts = Vec::new();
    push_color(&mut parts, "fg", cell.fg);
    push_color(&mut parts, "bg", cell.bg);
    parts.extend(cell.attributes.names().map(str::to_string));
    parts.join(" ")
}

/// Render rows as text with `[style ...]...[/style]` markers around runs of
/// identically styled cells. Trailing whitespace is trimmed per line.
pub fn cells_to_text(rows: &[Vec<Cell>]) -> String {
    let mut lines = Vec::with_capacity(rows.len());

    for row in rows {
        let mut line = String::new();
        let mut run_style = String::new();
        let mut run_text = String::new();

        for cell in row {
            let style = format_cell_style(cell);
            if style != run_style {
                flush_run(&mut line, &run_style, &mut run_text);
                run_style = style;
            }
            run_text.push_str(&cell.character);
        }
        flush_run(&mut line, &run_style, &mut run_text);

        lines.push(line.trim_end().to_string());
    }

    lines.join("\n")
}

fn flush_run(line: &mut String, style: &str, text: &mut String) {
    if text.is_empty() {
        return;
    }
    if style.is_empty() {
        line.push_str(text);
    } else {
        let _ = write!(line, "[style {style}]{text}[/style]");
    }
    text.clear();
}

/// Render rows as plain text.
pub fn cells_to_plain_text(rows: &[Vec<Cell>]) -> String {
    rows.iter()
        .map(|row| {
            let line: String = row.iter().map(|cell| cell.character.as_str()).collect();
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tunnelforge_types::CellAttributes;

    fn row(text: &str) -> Vec<Cell> {
        text.chars().map(|c| Cell::new(c.to_string())).collect()
    }

    #[test]
    fn unstyled_rows_are_trimmed_and_joined() {
        let rows = vec![row("ab  "), row("   "), row("c")];
        assert_eq!(cells_to_text(&rows), "ab\n\nc");
        assert_eq!(cells_to_plain_text(&rows), "ab\n\nc");
    }

    #[test]
    fn styled_runs_are_grouped() {
        let bold_red = |c: &str| {
            Cell::new(c)
                .with_fg(1)
                .with_attributes(CellAttributes::BOLD)
        };
        let rows = vec![vec![
            Cell::new(">"),
            bold_red("o"),
            bold_red("k"),
            Cell::new(" ").with_bg(0x102030),
        ]];

        assert_eq!(
            cells_to_text(&rows),
            r#">[style fg="1" bold]ok[/style][style bg="16,32,48"] [/style]"#
        );
    }

    #[test]
    fn style_string_lists_every_attribute() {
        let cell = Cell::new("x").with_attributes(
            CellAttributes::DIM | CellAttributes::INVISIBLE | CellAttributes::STRIKETHROUGH,
        );
        assert_eq!(format_cell_style(&cell), "dim invisible strikethrough");
    }
}
