//! Parsing, resizing and reassembling an SVG template.
//!
//! Templates are addressed positionally rather than via a DOM: a single
//! forward pass over the event stream records the indices of the handful
//! of elements the contract cares about (root, `#screen`, the generated
//! style element, the geometry element), plus a start→end index map so
//! `#screen`'s full subtree can be located and later replaced wholesale.

use std::collections::HashMap;
use std::io::Write as _;

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};
use crate::svg::{CELL_HEIGHT, CELL_WIDTH};

/// A parsed SVG template, ready to be resized to a cast's geometry and
/// reassembled with generated screen content and stylesheet.
#[derive(Debug, Clone)]
pub struct SvgTemplate {
    events: Vec<Event<'static>>,
    root_idx: usize,
    screen_start_idx: usize,
    screen_end_idx: usize,
    style_idx: usize,
    style_end_idx: Option<usize>,
    geometry_idx: usize,
    template_columns: u32,
    template_rows: u32,
}

impl SvgTemplate {
    /// Parses an SVG template, validating the presence of the elements the
    /// renderer depends on.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);

        let mut events: Vec<Event<'static>> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        let mut end_of: HashMap<usize, usize> = HashMap::new();

        let mut root_idx = None;
        let mut screen_start_idx = None;
        let mut screen_end_idx = None;
        let mut style_idx = None;
        let mut style_end_idx = None;
        let mut template_settings_idx = None;
        let mut geometry_idx = None;
        let mut geometry_parent_idx = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::InvalidTemplate(e.to_string()))?
                .into_owned();
            let idx = events.len();
            let is_eof = matches!(event, Event::Eof);

            match &event {
                Event::Start(start) => {
                    let local = start.local_name();
                    match local.as_ref() {
                        b"svg" if has_id(start, "screen") => screen_start_idx = Some(idx),
                        b"style" if has_id(start, "generated-style") => style_idx = Some(idx),
                        b"template_settings" => template_settings_idx = Some(idx),
                        b"screen_geometry" => {
                            geometry_idx = Some(idx);
                            geometry_parent_idx = stack.last().copied();
                        }
                        _ => {}
                    }
                    stack.push(idx);
                    if root_idx.is_none() {
                        root_idx = Some(idx);
                    }
                }
                Event::Empty(start) => {
                    let local = start.local_name();
                    match local.as_ref() {
                        b"svg" if has_id(start, "screen") => {
                            screen_start_idx = Some(idx);
                            screen_end_idx = Some(idx);
                        }
                        b"style" if has_id(start, "generated-style") => {
                            style_idx = Some(idx);
                            style_end_idx = None;
                        }
                        b"screen_geometry" => {
                            geometry_idx = Some(idx);
                            geometry_parent_idx = stack.last().copied();
                        }
                        _ => {}
                    }
                }
                Event::End(_) => {
                    if let Some(start_idx) = stack.pop() {
                        end_of.insert(start_idx, idx);
                        if style_idx == Some(start_idx) {
                            style_end_idx = Some(idx);
                        }
                    }
                }
                _ => {}
            }

            events.push(event);
            if is_eof {
                break;
            }
        }

        let root_idx =
            root_idx.ok_or_else(|| Error::InvalidTemplate("template has no root element".into()))?;
        let screen_start_idx = screen_start_idx.ok_or_else(|| {
            Error::InvalidTemplate("template is missing <svg id=\"screen\">".into())
        })?;
        let screen_end_idx = screen_end_idx
            .or_else(|| end_of.get(&screen_start_idx).copied())
            .ok_or_else(|| Error::InvalidTemplate("<svg id=\"screen\"> is unterminated".into()))?;
        let style_idx = style_idx.ok_or_else(|| {
            Error::InvalidTemplate("template is missing <style id=\"generated-style\">".into())
        })?;
        let template_settings_idx = template_settings_idx.ok_or_else(|| {
            Error::InvalidTemplate("template is missing a template_settings element".into())
        })?;
        let geometry_idx = geometry_idx.ok_or_else(|| {
            Error::InvalidTemplate("template is missing a screen_geometry element".into())
        })?;
        if geometry_parent_idx != Some(template_settings_idx) {
            return Err(Error::InvalidTemplate(
                "screen_geometry must be a child of template_settings".into(),
            ));
        }

        let geometry = match &events[geometry_idx] {
            Event::Start(start) | Event::Empty(start) => start,
            _ => unreachable!("geometry_idx always indexes a Start or Empty event"),
        };
        let template_columns = attr_u32(geometry, "columns").ok_or_else(|| {
            Error::InvalidTemplate("screen_geometry is missing a columns attribute".into())
        })?;
        let template_rows = attr_u32(geometry, "rows").ok_or_else(|| {
            Error::InvalidTemplate("screen_geometry is missing a rows attribute".into())
        })?;

        Ok(SvgTemplate {
            events,
            root_idx,
            screen_start_idx,
            screen_end_idx,
            style_idx,
            style_end_idx,
            geometry_idx,
            template_columns,
            template_rows,
        })
    }

    /// The template's declared cell geometry.
    pub fn template_geometry(&self) -> (u32, u32) {
        (self.template_columns, self.template_rows)
    }

    /// Resizes the document to `(columns, rows)` cells, growing or
    /// shrinking the root and `#screen` elements' `viewBox`/`width`/`height`
    /// by whole cells and updating the geometry element to match.
    pub fn resize(&mut self, columns: u32, rows: u32) -> Result<()> {
        let dw = CELL_WIDTH as i64 * (columns as i64 - self.template_columns as i64);
        let dh = CELL_HEIGHT as i64 * (rows as i64 - self.template_rows as i64);

        rewrite_attrs_at(&mut self.events, self.root_idx, |key, value| {
            adjust_dimension(key, value, dw, dh)
        })?;
        rewrite_attrs_at(&mut self.events, self.screen_start_idx, |key, value| {
            adjust_dimension(key, value, dw, dh)
        })?;
        rewrite_attrs_at(&mut self.events, self.geometry_idx, |key, _value| {
            match key {
                "columns" => Some(columns.to_string()),
                "rows" => Some(rows.to_string()),
                _ => None,
            }
        })?;

        self.template_columns = columns;
        self.template_rows = rows;
        Ok(())
    }

    /// Reassembles the template into a final document: `generated_css` is
    /// wrapped in a CDATA section and placed inside the generated-style
    /// element; `screen_inner_xml` is spliced verbatim as the children of
    /// `#screen`, replacing whatever the template originally held there.
    pub fn assemble(&self, generated_css: &str, screen_inner_xml: &str) -> Result<String> {
        let mut writer = Writer::new(Vec::new());

        let mut idx = 0;
        while idx < self.events.len() {
            if idx == self.style_idx {
                write_style_region(&mut writer, &self.events[self.style_idx], generated_css)?;
                idx = self.style_end_idx.map_or(idx + 1, |end| end + 1);
                continue;
            }
            if idx == self.screen_start_idx {
                write_screen_region(
                    &mut writer,
                    &self.events[self.screen_start_idx],
                    screen_inner_xml,
                )?;
                idx = self.screen_end_idx + 1;
                continue;
            }

            writer
                .write_event(self.events[idx].clone())
                .map_err(|e| Error::InvalidTemplate(e.to_string()))?;
            idx += 1;
        }

        String::from_utf8(writer.into_inner())
            .map_err(|e| Error::InvalidTemplate(e.to_string()))
    }
}

fn has_id(start: &BytesStart<'_>, expected: &str) -> bool {
    start
        .attributes()
        .flatten()
        .any(|a| a.key.as_ref() == b"id" && a.value.as_ref() == expected.as_bytes())
}

fn attr_u32(start: &BytesStart<'_>, name: &str) -> Option<u32> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name.as_bytes())
        .and_then(|a| std::str::from_utf8(a.value.as_ref()).ok()?.parse().ok())
}

fn adjust_dimension(key: &str, value: &str, dw: i64, dh: i64) -> Option<String> {
    match key {
        "viewBox" => {
            let parts: Vec<f64> = value.split_whitespace().filter_map(|p| p.parse().ok()).collect();
            if parts.len() != 4 {
                return None;
            }
            let width = parts[2] + dw as f64;
            let height = parts[3] + dh as f64;
            Some(format!("{} {} {} {}", parts[0], parts[1], width, height))
        }
        "width" => value.parse::<i64>().ok().map(|w| (w + dw).to_string()),
        "height" => value.parse::<i64>().ok().map(|h| (h + dh).to_string()),
        _ => None,
    }
}

fn rewrite_attrs_at(
    events: &mut [Event<'static>],
    idx: usize,
    f: impl Fn(&str, &str) -> Option<String>,
) -> Result<()> {
    let new_event = match &events[idx] {
        Event::Start(start) => Event::Start(rewrite_start(start, f)?),
        Event::Empty(start) => Event::Empty(rewrite_start(start, f)?),
        _ => return Err(Error::InvalidTemplate("expected an element".into())),
    };
    events[idx] = new_event;
    Ok(())
}

fn rewrite_start(
    start: &BytesStart<'_>,
    f: impl Fn(&str, &str) -> Option<String>,
) -> Result<BytesStart<'static>> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(|_| Error::InvalidTemplate("element name is not valid UTF-8".into()))?
        .to_owned();
    let mut new_start = BytesStart::new(tag);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::InvalidTemplate(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|_| Error::InvalidTemplate("attribute name is not valid UTF-8".into()))?
            .to_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::InvalidTemplate(e.to_string()))?
            .into_owned();
        let value = f(&key, &value).unwrap_or(value);
        new_start.push_attribute((key.as_str(), value.as_str()));
    }

    Ok(new_start)
}

fn write_style_region(
    writer: &mut Writer<Vec<u8>>,
    original: &Event<'static>,
    css: &str,
) -> Result<()> {
    let start = match original {
        Event::Start(start) | Event::Empty(start) => start.clone(),
        _ => return Err(Error::InvalidTemplate("generated-style is not an element".into())),
    };
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(|_| Error::InvalidTemplate("element name is not valid UTF-8".into()))?
        .to_owned();

    writer
        .write_event(Event::Start(start))
        .map_err(|e| Error::InvalidTemplate(e.to_string()))?;
    writer
        .write_event(Event::CData(BytesCData::new(css)))
        .map_err(|e| Error::InvalidTemplate(e.to_string()))?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(|e| Error::InvalidTemplate(e.to_string()))?;
    Ok(())
}

fn write_screen_region(
    writer: &mut Writer<Vec<u8>>,
    original: &Event<'static>,
    screen_inner_xml: &str,
) -> Result<()> {
    let start = match original {
        Event::Start(start) | Event::Empty(start) => start.clone(),
        _ => return Err(Error::InvalidTemplate("#screen is not an element".into())),
    };

    writer
        .write_event(Event::Start(start))
        .map_err(|e| Error::InvalidTemplate(e.to_string()))?;
    // The generated content is plain SVG markup, not text: write it
    // directly so its tags are not escaped, then close the element with a
    // literal tag (the template's SVG elements use the default namespace).
    writer.get_mut().write_all(screen_inner_xml.as_bytes())?;
    writer.get_mut().write_all(b"</svg>")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" xmlns:termcap="https://github.com/rexwzh/termcap" viewBox="0 0 100 200" width="100" height="200">
<defs>
<termcap:template_settings><termcap:screen_geometry columns="10" rows="5"/></termcap:template_settings>
<style id="generated-style"></style>
</defs>
<svg id="screen" viewBox="0 0 100 200" width="100" height="200"></svg>
</svg>"#;

    #[test]
    fn parses_geometry_from_template_settings() {
        let template = SvgTemplate::parse(TEMPLATE).unwrap();
        assert_eq!(template.template_geometry(), (10, 5));
    }

    #[test]
    fn missing_screen_element_is_rejected() {
        let xml = r#"<svg xmlns:termcap="https://github.com/rexwzh/termcap"><defs><termcap:template_settings><termcap:screen_geometry columns="1" rows="1"/></termcap:template_settings><style id="generated-style"></style></defs></svg>"#;
        let err = SvgTemplate::parse(xml).unwrap_err();
        assert!(matches!(err, Error::InvalidTemplate(_)));
    }

    #[test]
    fn missing_template_settings_is_rejected() {
        let xml = r#"<svg xmlns:termcap="https://github.com/rexwzh/termcap"><defs><style id="generated-style"></style></defs><svg id="screen"></svg></svg>"#;
        let err = SvgTemplate::parse(xml).unwrap_err();
        assert!(matches!(err, Error::InvalidTemplate(_)));
    }

    #[test]
    fn screen_geometry_outside_template_settings_is_rejected() {
        // A stray screen_geometry alongside (not inside) template_settings
        // must not be accepted as the real geometry source.
        let xml = r#"<svg xmlns:termcap="https://github.com/rexwzh/termcap"><defs><termcap:template_settings></termcap:template_settings><termcap:screen_geometry columns="1" rows="1"/><style id="generated-style"></style></defs><svg id="screen"></svg></svg>"#;
        let err = SvgTemplate::parse(xml).unwrap_err();
        assert!(matches!(err, Error::InvalidTemplate(_)));
    }

    #[test]
    fn resize_grows_viewbox_width_height_and_geometry() {
        let mut template = SvgTemplate::parse(TEMPLATE).unwrap();
        template.resize(12, 7).unwrap();
        assert_eq!(template.template_geometry(), (12, 7));

        let assembled = template.assemble("", "").unwrap();
        // dw = 8 * (12 - 10) = 16, dh = 17 * (7 - 5) = 34
        assert!(assembled.contains(r#"viewBox="0 0 116 234""#));
        assert!(assembled.contains(r#"width="116""#));
        assert!(assembled.contains(r#"height="234""#));
        assert!(assembled.contains(r#"columns="12""#));
        assert!(assembled.contains(r#"rows="7""#));
    }

    #[test]
    fn assemble_injects_css_and_screen_markup_raw() {
        let template = SvgTemplate::parse(TEMPLATE).unwrap();
        let assembled = template
            .assemble(".foo{color:red}", "<rect width=\"1\" height=\"1\"/>")
            .unwrap();
        assert!(assembled.contains("<![CDATA[.foo{color:red}]]>"));
        assert!(assembled.contains("<rect width=\"1\" height=\"1\"/>"));
        assert!(assembled.contains("</svg>"));
    }
}
