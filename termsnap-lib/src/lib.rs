//! Terminal emulation, frame sampling and SVG synthesis for recorded
//! terminal sessions.
//!
//! ```rust
//! use termsnap_lib::{Term, VoidPtyWriter};
//!
//! let mut term = Term::new(24, 80, VoidPtyWriter);
//! for byte in b"a line of \x1B[32mcolored\x1B[0m terminal data" {
//!     term.process(*byte);
//! }
//!
//! let buffer = term.snapshot(80, 24);
//! let text: String = buffer
//!     .values()
//!     .flat_map(|row| row.values())
//!     .map(|cell| cell.text)
//!     .collect();
//! assert!(text.contains("colored"));
//! ```

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use alacritty_terminal::{
    term::{
        cell::{Cell as AlacrittyCell, Flags},
        test::TermSize,
        Config, Term as AlacrittyTerm, TermMode,
    },
    vte::{
        self,
        ansi::{Color, NamedColor, Processor},
    },
};

mod cast;
mod colors;
mod error;
mod frames;
mod svg;

pub use cast::{read_cast, CastEvent, CastHeader, CastWriter, EventKind};
pub use error::{Error, Result};
pub use frames::{sample_frames, FrameSamplerOptions, TimedFrame};
pub use svg::{render_animation, render_still_frames, SvgTemplate};

use colors::color_token;

/// The unicode character and style of a single cell as the SVG layer sees
/// it. `color`/`background_color` are either a named CSS class the
/// template's stylesheet defines (`"foreground"`, `"background"`, a named
/// ANSI color) or an explicit `#RRGGBB` literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacterCell {
    pub text: char,
    pub color: String,
    pub background_color: String,
    pub bold: bool,
    pub italics: bool,
    pub underscore: bool,
    pub strikethrough: bool,
}

/// A row of a frame buffer: present columns only, absent columns render as
/// template background.
pub type SparseRow = BTreeMap<u16, CharacterCell>;
/// A full frame buffer: present rows only.
pub type SparseBuffer = BTreeMap<u16, SparseRow>;

/// A sink for responses sent by the [terminal emulator](Term) in reaction
/// to ANSI requests (device status reports, clipboard reads, and so on).
pub trait PtyWriter {
    fn write(&mut self, text: String);
}

impl<F: FnMut(String)> PtyWriter for F {
    fn write(&mut self, text: String) {
        self(text)
    }
}

/// A [`PtyWriter`] that ignores all responses; used when replaying a cast
/// for rendering, where there is no pty to answer.
pub struct VoidPtyWriter;

impl PtyWriter for VoidPtyWriter {
    fn write(&mut self, _text: String) {}
}

struct EventProxy<Ev> {
    handler: std::cell::RefCell<Ev>,
}

impl<W: PtyWriter> alacritty_terminal::event::EventListener for EventProxy<W> {
    fn send_event(&self, event: alacritty_terminal::event::Event) {
        use alacritty_terminal::event::Event as AEvent;
        match event {
            AEvent::PtyWrite(text) => self.handler.borrow_mut().write(text),
            _ev => {}
        }
    }
}

/// An in-memory VT/ANSI terminal emulator.
pub struct Term<W: PtyWriter> {
    term: AlacrittyTerm<EventProxy<W>>,
    processor: vte::ansi::Processor<vte::ansi::StdSyncHandler>,
}

impl<W: PtyWriter> Term<W> {
    /// Create a new emulated terminal with a cell matrix of `lines` by `columns`.
    pub fn new(lines: u16, columns: u16, pty_writer: W) -> Self {
        let term = AlacrittyTerm::new(
            Config::default(),
            &TermSize {
                columns: columns.into(),
                screen_lines: lines.into(),
            },
            EventProxy {
                handler: pty_writer.into(),
            },
        );

        Term {
            term,
            processor: Processor::new(),
        }
    }

    /// Process one byte of ANSI-escaped terminal data.
    pub fn process(&mut self, byte: u8) {
        self.processor.advance(&mut self.term, byte);
    }

    /// Snapshot the visible screen as a sparse `row -> column -> cell`
    /// mapping. Cells equal to the grid's default blank cell are omitted;
    /// they render as template background. The cursor, if visible and
    /// in bounds, overlays exactly one cell with its glyph kept and its
    /// colors swapped per the emulator's current pen attributes.
    pub fn snapshot(&self, columns: u16, rows: u16) -> SparseBuffer {
        let mut buffer: SparseBuffer = BTreeMap::new();

        for indexed in self.term.grid().display_iter() {
            let cell = indexed.cell;
            if cell
                .flags
                .intersects(Flags::WIDE_CHAR_SPACER | Flags::LEADING_WIDE_CHAR_SPACER)
            {
                continue;
            }
            if is_default_cell(cell) {
                continue;
            }

            let line = indexed.point.line.0;
            if line < 0 || line as u16 >= rows {
                continue;
            }
            let column = indexed.point.column.0 as u16;
            if column >= columns {
                continue;
            }

            buffer
                .entry(line as u16)
                .or_default()
                .insert(column, cell_to_character(cell));
        }

        if self.term.mode().contains(TermMode::SHOW_CURSOR) {
            let cursor = &self.term.grid().cursor;
            let line = cursor.point.line.0;
            let column = cursor.point.column.0 as u16;
            if line >= 0 && (line as u16) < rows && column < columns {
                let line = line as u16;
                let glyph = buffer
                    .get(&line)
                    .and_then(|row| row.get(&column))
                    .map(|cell| cell.text)
                    .unwrap_or(' ');

                let pen = &cursor.template;
                let mut color = color_token(pen.fg);
                let mut background_color = color_token(pen.bg);
                std::mem::swap(&mut color, &mut background_color);

                buffer.entry(line).or_default().insert(
                    column,
                    CharacterCell {
                        text: glyph,
                        color,
                        background_color,
                        bold: false,
                        italics: false,
                        underscore: false,
                        strikethrough: false,
                    },
                );
            }
        }

        buffer
    }
}

fn is_default_cell(cell: &AlacrittyCell) -> bool {
    cell.c == ' '
        && cell.fg == Color::Named(NamedColor::Foreground)
        && cell.bg == Color::Named(NamedColor::Background)
        && cell.flags.is_empty()
}

fn cell_to_character(cell: &AlacrittyCell) -> CharacterCell {
    let mut color = color_token(cell.fg);
    let mut background_color = color_token(cell.bg);
    if cell.flags.intersects(Flags::INVERSE) {
        std::mem::swap(&mut color, &mut background_color);
    }

    CharacterCell {
        text: cell.c,
        color,
        background_color,
        bold: cell.flags.intersects(Flags::BOLD),
        italics: cell.flags.intersects(Flags::ITALIC),
        underscore: cell.flags.intersects(Flags::ALL_UNDERLINES),
        strikethrough: cell.flags.intersects(Flags::STRIKEOUT),
    }
}
