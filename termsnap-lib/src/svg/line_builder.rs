//! Converting one frame row into background rects and run-length-compressed
//! text, with cross-row definition reuse for identical text layers.
//!
//! Column runs (both background and text) break not just on a changed
//! attribute but on a column gap: a cell at column `c` only continues a run
//! started earlier if it sits immediately after the previous cell's display
//! width (accounting for wide glyphs that occupy two columns).

use std::collections::HashMap;
use std::fmt::Write as _;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::svg::{CELL_HEIGHT, CELL_WIDTH};
use crate::{CharacterCell, SparseRow};

fn cell_width(c: char) -> u32 {
    UnicodeWidthChar::width(c).unwrap_or(1) as u32
}

/// Canonical `<g>` text-run serializations already emitted into `<defs>`,
/// keyed so identical rows across frames share one definition instead of
/// being repeated frame after frame.
#[derive(Default)]
pub(crate) struct SvgDefinitions {
    ids_by_markup: HashMap<String, String>,
    order: Vec<String>,
}

impl SvgDefinitions {
    /// Interns a row's canonical text-run markup, returning the `<g>` id to
    /// `<use>`. Assigns a fresh `g<N+1>` id the first time a serialization
    /// is seen; later identical serializations reuse it.
    fn intern(&mut self, inner: String) -> String {
        if let Some(id) = self.ids_by_markup.get(&inner) {
            return id.clone();
        }

        let id = format!("g{}", self.order.len() + 1);
        self.order.push(format!(r#"<g id="{id}">{inner}</g>"#));
        self.ids_by_markup.insert(inner, id.clone());
        id
    }

    /// All interned `<g>` definitions, in assignment order, ready to be
    /// spliced into a `<defs>` element.
    pub(crate) fn into_markup(self) -> String {
        self.order.concat()
    }
}

/// Renders one frame row at vertical offset `y_offset`: zero or more
/// background `<rect>`s, followed by a `<use>` referencing the row's
/// (possibly freshly interned) text-run definition.
pub(crate) fn render_row(
    y_offset: u32,
    row_number: u16,
    row: &SparseRow,
    definitions: &mut SvgDefinitions,
) -> String {
    let y = y_offset + u32::from(row_number) * CELL_HEIGHT;
    let mut out = String::new();

    render_background_rects(&mut out, y, row);

    let id = definitions.intern(render_text_runs(row));
    let _ = write!(out, r#"<use href="#{id}" y="{y}"/>"#);

    out
}

fn render_background_rects(out: &mut String, y: u32, row: &SparseRow) {
    let mut run: Option<(u16, u32, &str)> = None; // (start_col, width_so_far, color)
    let mut expected_col: Option<u16> = None;

    for (&column, cell) in row {
        if cell.background_color == "background" {
            if let Some((start_col, width, color)) = run.take() {
                emit_rect(out, start_col, width, y, color);
            }
            expected_col = None;
            continue;
        }

        let continues = expected_col == Some(column)
            && run.as_ref().is_some_and(|(_, _, color)| *color == cell.background_color);

        if continues {
            if let Some((_, width, _)) = run.as_mut() {
                *width += cell_width(cell.text);
            }
        } else {
            if let Some((start_col, width, color)) = run.take() {
                emit_rect(out, start_col, width, y, color);
            }
            run = Some((column, cell_width(cell.text), cell.background_color.as_str()));
        }

        expected_col = Some(column + cell_width(cell.text) as u16);
    }
    if let Some((start_col, width, color)) = run.take() {
        emit_rect(out, start_col, width, y, color);
    }
}

fn emit_rect(out: &mut String, start_col: u16, width_cells: u32, y: u32, color: &str) {
    let x = u32::from(start_col) * CELL_WIDTH;
    let width = width_cells * CELL_WIDTH;
    let _ = if let Some(hex) = color.strip_prefix('#') {
        write!(
            out,
            r#"<rect x="{x}" y="{y}" width="{width}" height="{CELL_HEIGHT}" fill="#{hex}"/>"#
        )
    } else {
        write!(
            out,
            r#"<rect x="{x}" y="{y}" width="{width}" height="{CELL_HEIGHT}" class="{color}"/>"#
        )
    };
}

#[derive(PartialEq)]
struct TextStyle<'a> {
    color: &'a str,
    bold: bool,
    italics: bool,
    underscore: bool,
    strikethrough: bool,
}

impl<'a> TextStyle<'a> {
    fn of(cell: &'a CharacterCell) -> Self {
        TextStyle {
            color: &cell.color,
            bold: cell.bold,
            italics: cell.italics,
            underscore: cell.underscore,
            strikethrough: cell.strikethrough,
        }
    }
}

fn render_text_runs(row: &SparseRow) -> String {
    let mut out = String::new();
    let mut run_start: Option<(u16, TextStyle, String)> = None;
    let mut expected_col: Option<u16> = None;

    for (&column, cell) in row {
        let style = TextStyle::of(cell);
        let continues = expected_col == Some(column)
            && run_start.as_ref().is_some_and(|(_, s, _)| *s == style);

        if continues {
            let (_, _, text) = run_start.as_mut().unwrap();
            text.push(cell.text);
        } else {
            if let Some((start_col, style, text)) = run_start.take() {
                emit_text(&mut out, start_col, &style, &text);
            }
            let mut text = String::new();
            text.push(cell.text);
            run_start = Some((column, style, text));
        }

        expected_col = Some(column + cell_width(cell.text) as u16);
    }

    if let Some((start_col, style, text)) = run_start.take() {
        emit_text(&mut out, start_col, &style, &text);
    }

    out
}

fn emit_text(out: &mut String, start_col: u16, style: &TextStyle, text: &str) {
    let x = u32::from(start_col) * CELL_WIDTH;
    let text_length = UnicodeWidthStr::width(text) as u32 * CELL_WIDTH;

    let _ = write!(out, r#"<text x="{x}" textLength="{text_length}""#);
    if style.bold {
        let _ = write!(out, r#" font-weight="bold""#);
    }
    if style.italics {
        let _ = write!(out, r#" font-style="italic""#);
    }
    if style.underscore || style.strikethrough {
        let mut decoration = String::new();
        if style.underscore {
            decoration.push_str("underline");
        }
        if style.strikethrough {
            if !decoration.is_empty() {
                decoration.push(' ');
            }
            decoration.push_str("line-through");
        }
        let _ = write!(out, r#" text-decoration="{decoration}""#);
    }
    if let Some(hex) = style.color.strip_prefix('#') {
        let _ = write!(out, r#" fill="#{hex}""#);
    } else {
        let _ = write!(out, r#" class="{}""#, style.color);
    }
    out.push('>');
    escape_text(out, text);
    out.push_str("</text>");
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '&' => out.push_str("&amp;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(text: char, color: &str, background_color: &str) -> CharacterCell {
        CharacterCell {
            text,
            color: color.to_owned(),
            background_color: background_color.to_owned(),
            bold: false,
            italics: false,
            underscore: false,
            strikethrough: false,
        }
    }

    #[test]
    fn identical_rows_share_one_definition() {
        let mut row = SparseRow::new();
        row.insert(0, cell('a', "foreground", "background"));
        row.insert(1, cell('b', "foreground", "background"));

        let mut defs = SvgDefinitions::default();
        let first = render_row(0, 0, &row, &mut defs);
        let second = render_row(34, 3, &row, &mut defs);

        let id_of = |markup: &str| {
            markup
                .split("href=\"#")
                .nth(1)
                .unwrap()
                .split('"')
                .next()
                .unwrap()
                .to_owned()
        };
        assert_eq!(id_of(&first), id_of(&second));
        assert_eq!(defs.order.len(), 1);
    }

    #[test]
    fn background_run_breaks_on_color_change() {
        let mut row = SparseRow::new();
        row.insert(0, cell('a', "foreground", "red"));
        row.insert(1, cell('b', "foreground", "blue"));
        let mut out = String::new();
        render_background_rects(&mut out, 0, &row);
        assert!(out.contains(r#"x="0" y="0" width="8" height="17" class="red""#));
        assert!(out.contains(r#"x="8" y="0" width="8" height="17" class="blue""#));
    }

    #[test]
    fn background_cells_are_omitted() {
        let mut row = SparseRow::new();
        row.insert(0, cell(' ', "foreground", "background"));
        let mut out = String::new();
        render_background_rects(&mut out, 0, &row);
        assert!(out.is_empty());
    }

    #[test]
    fn hex_colors_use_fill_named_colors_use_class() {
        let mut row = SparseRow::new();
        row.insert(0, cell('a', "#ff0000", "background"));
        row.insert(1, cell('b', "red", "background"));
        let text = render_text_runs(&row);
        assert!(text.contains(r#"fill="#ff0000""#));
        assert!(text.contains(r#"class="red""#));
    }

    #[test]
    fn wide_glyph_advances_run_by_two_columns() {
        // "更" is a two-column East Asian wide character; the next cell sits
        // at column 2, not 1, and should still be seen as contiguous.
        let mut row = SparseRow::new();
        row.insert(0, cell('更', "foreground", "background"));
        row.insert(2, cell('x', "foreground", "background"));
        let text = render_text_runs(&row);
        // one run, not two: textLength accounts for the wide glyph.
        assert_eq!(text.matches("<text").count(), 1);
        assert!(text.contains(r#"textLength="24""#));
    }
}
