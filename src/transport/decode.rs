//! Incremental UTF-8 decoding for body segments.
//!
//! A network read can end in the middle of a multi-byte character. The
//! decoder holds those trailing bytes back until the next segment arrives
//! instead of emitting replacement characters for them.

#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `pending + bytes` as forms complete characters.
    /// Invalid sequences become U+FFFD; an incomplete tail is kept.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::new();
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this slice is UTF-8
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let keep = rest.len();
        let start = self.pending.len() - keep;
        self.pending.drain(..start);
        out
    }

    /// Flushes whatever is still held back, lossily.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(b"Hi there"), "Hi there");
        assert!(!dec.has_pending());
    }

    #[test]
    fn split_multibyte_char_is_held_back() {
        let bytes = "é!".as_bytes(); // [0xC3, 0xA9, b'!']
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(&bytes[..1]), "");
        assert!(dec.has_pending());
        assert_eq!(dec.decode(&bytes[1..]), "é!");
        assert!(!dec.has_pending());
    }

    #[test]
    fn four_byte_char_across_three_segments() {
        let bytes = "👋".as_bytes();
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(&bytes[..1]), "");
        assert_eq!(dec.decode(&bytes[1..3]), "");
        assert_eq!(dec.decode(&bytes[3..]), "👋");
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
        assert!(!dec.has_pending());
    }

    #[test]
    fn finish_flushes_incomplete_tail() {
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(dec.finish(), "\u{FFFD}");
        assert!(!dec.has_pending());
    }
}
