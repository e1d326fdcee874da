//! An incremental UTF-8 decoder that tolerates byte sequences split across
//! read boundaries and replaces malformed bytes with U+FFFD, mirroring
//! Python's `codecs.getincrementaldecoder("utf-8")(errors="replace")`.

#[derive(Default)]
pub struct Utf8IncrementalDecoder {
    pending: Vec<u8>,
}

impl Utf8IncrementalDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `bytes` as possible, buffering any trailing
    /// incomplete sequence for the next call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        self.drain(false)
    }

    /// Flushes any buffered bytes, replacing an incomplete trailing
    /// sequence with U+FFFD instead of holding it for a call that will
    /// never come.
    pub fn finish(mut self) -> String {
        self.drain(true)
    }

    fn drain(&mut self, is_final: bool) -> String {
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.pending[..valid_up_to]).unwrap());

                    match err.error_len() {
                        Some(bad_len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + bad_len);
                        }
                        None => {
                            // Trailing bytes look like the start of a sequence that simply
                            // hasn't arrived yet.
                            self.pending.drain(..valid_up_to);
                            if is_final && !self.pending.is_empty() {
                                out.push(char::REPLACEMENT_CHARACTER);
                                self.pending.clear();
                            }
                            return out;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ascii_in_one_shot() {
        let mut decoder = Utf8IncrementalDecoder::new();
        assert_eq!(decoder.decode(b"hello"), "hello");
    }

    #[test]
    fn multi_byte_character_split_across_calls_decodes_whole() {
        // "é" is 0xC3 0xA9 in UTF-8.
        let mut decoder = Utf8IncrementalDecoder::new();
        assert_eq!(decoder.decode(&[0xC3]), "");
        assert_eq!(decoder.decode(&[0xA9]), "\u{e9}");
    }

    #[test]
    fn malformed_byte_is_replaced_not_fatal() {
        let mut decoder = Utf8IncrementalDecoder::new();
        let out = decoder.decode(&[b'a', 0xFF, b'b']);
        assert_eq!(out, "a\u{fffd}b");
    }

    #[test]
    fn unfinished_sequence_at_stream_end_is_replaced_on_finish() {
        let mut decoder = Utf8IncrementalDecoder::new();
        assert_eq!(decoder.decode(&[0xC3]), "");
        assert_eq!(decoder.finish(), "\u{fffd}");
    }
}
