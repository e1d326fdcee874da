//! Reading and writing the asciicast v2 line-JSON format.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// The header line of an asciicast v2 file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastHeader {
    pub version: u32,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_time_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub theme: BTreeMap<String, String>,
}

impl CastHeader {
    pub fn new(width: u32, height: u32) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs());

        CastHeader {
            version: 2,
            width,
            height,
            timestamp,
            duration: None,
            idle_time_limit: None,
            command: None,
            title: None,
            env: BTreeMap::new(),
            theme: BTreeMap::new(),
        }
    }
}

/// The kind of an asciicast event. Only `Output` is consumed by rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Output,
    Input,
}

impl EventKind {
    fn as_str(self) -> &'static str {
        match self {
            EventKind::Output => "o",
            EventKind::Input => "i",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "o" => Some(EventKind::Output),
            "i" => Some(EventKind::Input),
            _ => None,
        }
    }
}

/// One `[time, kind, payload]` event line.
#[derive(Debug, Clone, PartialEq)]
pub struct CastEvent {
    pub time: f64,
    pub kind: EventKind,
    pub payload: String,
}

/// Parses the header line. Returns `InvalidHeader` if it is not a JSON
/// object, and `UnsupportedVersion` if present but `version != 2`.
pub fn parse_header(line: &str) -> Result<CastHeader> {
    let value: Value = serde_json::from_str(line).map_err(|_| Error::InvalidHeader)?;
    let version = value
        .get("version")
        .and_then(Value::as_u64)
        .ok_or(Error::InvalidHeader)?;
    if version != 2 {
        return Err(Error::UnsupportedVersion(version as u32));
    }
    serde_json::from_value(value).map_err(|_| Error::InvalidHeader)
}

/// Parses one event line. Returns `None` for malformed lines (the parser
/// tolerates and skips these rather than failing the whole read).
fn parse_event_line(line: &str) -> Option<CastEvent> {
    let value: Value = serde_json::from_str(line).ok()?;
    let array = value.as_array()?;
    if array.len() < 3 {
        return None;
    }
    let time = array[0].as_f64()?;
    let kind = EventKind::from_str(array[1].as_str()?)?;
    let payload = array[2].as_str()?.to_owned();
    Some(CastEvent { time, kind, payload })
}

/// Reads a full asciicast v2 stream: the header, plus every event line that
/// parses. Malformed event lines and blank lines are silently skipped.
pub fn read_cast(reader: impl BufRead) -> Result<(CastHeader, Vec<CastEvent>)> {
    let mut lines = reader.lines();

    let header = loop {
        let line = lines.next().ok_or(Error::InvalidHeader)??;
        if line.trim().is_empty() {
            continue;
        }
        break parse_header(&line)?;
    };

    let mut events = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(event) = parse_event_line(&line) {
            events.push(event);
        }
    }

    Ok((header, events))
}

/// Writes an asciicast v2 stream: the header line, then one event per line.
pub struct CastWriter<W: Write> {
    writer: W,
}

impl<W: Write> CastWriter<W> {
    pub fn new(writer: W) -> Self {
        CastWriter { writer }
    }

    pub fn write_header(&mut self, header: &CastHeader) -> Result<()> {
        let line = serde_json::to_string(header).expect("CastHeader always serializes");
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    pub fn write_event(&mut self, event: &CastEvent) -> Result<()> {
        let array = serde_json::json!([event.time, event.kind.as_str(), event.payload]);
        writeln!(self.writer, "{array}")?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = CastHeader {
            version: 2,
            width: 80,
            height: 24,
            timestamp: Some(1_700_000_000),
            duration: None,
            idle_time_limit: Some(2.0),
            command: Some("/bin/bash".to_owned()),
            title: None,
            env: BTreeMap::new(),
            theme: BTreeMap::new(),
        };

        let mut buf = Vec::new();
        let mut writer = CastWriter::new(&mut buf);
        writer.write_header(&header).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let parsed = parse_header(text.trim_end()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let err = parse_header(r#"{"version":1}"#).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(1)));
    }

    #[test]
    fn missing_header_is_invalid() {
        let err = parse_header("not json").unwrap_err();
        assert!(matches!(err, Error::InvalidHeader));
    }

    #[test]
    fn malformed_event_lines_are_skipped() {
        let text = "{\"version\":2,\"width\":80,\"height\":24}\n[0.1,\"o\",\"a\"]\nnot an event\n[]\n[0.2,\"o\",\"b\"]\n";
        let (header, events) = read_cast(std::io::Cursor::new(text)).unwrap();
        assert_eq!(header.width, 80);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload, "a");
        assert_eq!(events[1].payload, "b");
    }

    #[test]
    fn event_kind_other_than_o_or_i_is_skipped() {
        let text = "{\"version\":2,\"width\":80,\"height\":24}\n[0.1,\"r\",\"a\"]\n[0.2,\"o\",\"b\"]\n";
        let (_, events) = read_cast(std::io::Cursor::new(text)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, "b");
    }
}
