//! Assembling a sequence of [`TimedFrame`]s into a final SVG document: a
//! single looping animation, or a directory's worth of independent still
//! frames.

use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::frames::TimedFrame;
use crate::svg::line_builder::{render_row, SvgDefinitions};
use crate::svg::template::SvgTemplate;
use crate::svg::{ceil_even, CELL_HEIGHT, FRAME_CELL_SPACING};

const BASE_CSS: &str = "#screen {\n  font-family: monospace;\n  white-space: pre;\n}\ntext {\n  dominant-baseline: text-before-edge;\n}\n";

/// Renders `frames` as a single self-contained looping SVG animation: every
/// frame's screen is stacked vertically in `#screen_view`, and a generated
/// `@keyframes roll` rule translates that stack so exactly one frame shows
/// at a time.
pub fn render_animation(
    template: &SvgTemplate,
    columns: u32,
    rows: u32,
    frames: &[TimedFrame],
) -> Result<String> {
    let mut template = template.clone();
    template.resize(columns, rows)?;

    let last = frames
        .last()
        .ok_or(Error::InvalidAnimation)?;
    let animation_duration_ms = last.start_ms + last.duration_ms;
    if animation_duration_ms == 0 {
        return Err(Error::InvalidAnimation);
    }

    let mut definitions = SvgDefinitions::default();
    let mut screen_view = String::new();
    let mut stops: Vec<(u64, i64)> = Vec::with_capacity(frames.len());

    let rows_per_frame = ceil_even(rows + FRAME_CELL_SPACING);

    for (index, frame) in frames.iter().enumerate() {
        let offset = index as u32 * rows_per_frame * CELL_HEIGHT;

        screen_view.push_str("<g>");
        for (&row_number, row) in &frame.buffer {
            screen_view.push_str(&render_row(offset, row_number, row, &mut definitions));
        }
        screen_view.push_str("</g>");

        stops.push((frame.start_ms, -(offset as i64)));
    }

    let css = format!(
        "{BASE_CSS}{}",
        keyframes_css(&stops, animation_duration_ms)
    );

    let screen_inner = format!(
        r#"<rect class="background" x="0" y="0" width="100%" height="100%"/><defs>{}</defs><g id="screen_view">{screen_view}</g>"#,
        definitions.into_markup(),
    );

    template.assemble(&css, &screen_inner)
}

/// Renders `frames` as independent still SVGs, one document per frame, each
/// with its screen content positioned at `y_offset = 0` and no animation
/// CSS. Returns the documents in frame order; callers name the files (e.g.
/// `frame_00000.svg`, zero-padded to 5 digits).
pub fn render_still_frames(
    template: &SvgTemplate,
    columns: u32,
    rows: u32,
    frames: &[TimedFrame],
) -> Result<Vec<String>> {
    let mut template = template.clone();
    template.resize(columns, rows)?;

    let mut out = Vec::with_capacity(frames.len());
    for frame in frames {
        let mut definitions = SvgDefinitions::default();
        let mut frame_group = String::new();
        for (&row_number, row) in &frame.buffer {
            frame_group.push_str(&render_row(0, row_number, row, &mut definitions));
        }

        let screen_inner = format!(
            r#"<rect class="background" x="0" y="0" width="100%" height="100%"/><defs>{}</defs><g>{frame_group}</g>"#,
            definitions.into_markup(),
        );

        out.push(template.assemble(BASE_CSS, &screen_inner)?);
    }

    Ok(out)
}

fn keyframes_css(stops: &[(u64, i64)], animation_duration_ms: u64) -> String {
    let mut css = String::new();
    let _ = writeln!(
        css,
        ":root {{\n  --animation-duration: {animation_duration_ms}ms;\n}}"
    );
    css.push_str("@keyframes roll {\n");
    for &(start_ms, offset) in stops {
        let percentage = 100.0 * start_ms as f64 / animation_duration_ms as f64;
        let _ = writeln!(css, "  {percentage}% {{ transform: translateY({offset}px); }}");
    }
    if let Some(&(_, last_offset)) = stops.last() {
        let _ = writeln!(css, "  100% {{ transform: translateY({last_offset}px); }}");
    }
    css.push_str("}\n");
    let _ = write!(
        css,
        "#screen_view {{\n  animation-name: roll;\n  animation-duration: {animation_duration_ms}ms;\n  animation-iteration-count: infinite;\n  animation-timing-function: steps(1,end);\n  animation-fill-mode: forwards;\n}}\n"
    );
    css
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::CharacterCell;

    const TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" xmlns:termcap="https://github.com/rexwzh/termcap" viewBox="0 0 80 170" width="80" height="170">
<defs>
<termcap:template_settings><termcap:screen_geometry columns="10" rows="10"/></termcap:template_settings>
<style id="generated-style"></style>
</defs>
<svg id="screen" viewBox="0 0 80 170" width="80" height="170"></svg>
</svg>"#;

    fn frame(start_ms: u64, duration_ms: u64, text: &str) -> TimedFrame {
        let mut row = BTreeMap::new();
        for (i, c) in text.chars().enumerate() {
            row.insert(
                i as u16,
                CharacterCell {
                    text: c,
                    color: "foreground".to_owned(),
                    background_color: "background".to_owned(),
                    bold: false,
                    italics: false,
                    underscore: false,
                    strikethrough: false,
                },
            );
        }
        let mut buffer = BTreeMap::new();
        buffer.insert(0, row);
        TimedFrame {
            start_ms,
            duration_ms,
            buffer,
        }
    }

    #[test]
    fn zero_duration_animation_is_rejected() {
        let template = SvgTemplate::parse(TEMPLATE).unwrap();
        let frames = vec![frame(0, 0, "")];
        let err = render_animation(&template, 10, 10, &frames).unwrap_err();
        assert!(matches!(err, Error::InvalidAnimation));
    }

    #[test]
    fn identical_frame_text_shares_one_definition() {
        let template = SvgTemplate::parse(TEMPLATE).unwrap();
        let frames = vec![frame(0, 500, "hi"), frame(500, 500, "hi")];
        let svg = render_animation(&template, 10, 10, &frames).unwrap();
        assert_eq!(svg.matches("<g id=\"g").count(), 1);
        assert_eq!(svg.matches("href=\"#g1\"").count(), 2);
    }

    #[test]
    fn animation_css_binds_screen_view_and_has_final_stop() {
        let template = SvgTemplate::parse(TEMPLATE).unwrap();
        let frames = vec![frame(0, 500, "a"), frame(500, 1000, "b")];
        let svg = render_animation(&template, 10, 10, &frames).unwrap();
        assert!(svg.contains("animation-name: roll"));
        // rows_per_frame = ceil_even(10 + 1) * CELL_HEIGHT = 12 * 17 = 204
        assert!(svg.contains("100% { transform: translateY(-204px); }"));
        assert!(svg.contains("--animation-duration: 1500ms;"));
    }

    #[test]
    fn still_frames_have_no_screen_view_or_keyframes() {
        let template = SvgTemplate::parse(TEMPLATE).unwrap();
        let frames = vec![frame(0, 500, "a"), frame(500, 500, "b")];
        let docs = render_still_frames(&template, 10, 10, &frames).unwrap();
        assert_eq!(docs.len(), 2);
        for doc in &docs {
            assert!(!doc.contains("screen_view"));
            assert!(!doc.contains("@keyframes"));
        }
    }
}
