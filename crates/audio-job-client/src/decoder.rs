//! Incremental UTF-8 decoding of network chunks.

/// Converts raw byte chunks into text, carrying incomplete multi-byte
/// sequences over to the next chunk.
///
/// Invalid byte sequences decode to U+FFFD, matching lossy decoding of the
/// whole stream at once.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    carry: Vec<u8>,
}

impl ChunkDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `bytes`, holding back a trailing partial character.
    pub fn feed(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.carry.len());
        let mut consumed = 0;
        loop {
            let rest = &self.carry[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.carry.len();
                    break;
                }
                Err(err) => {
                    let valid_len = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_len]));
                    match err.error_len() {
                        Some(invalid_len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid_len + invalid_len;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            consumed += valid_len;
                            break;
                        }
                    }
                }
            }
        }
        self.carry.drain(..consumed);
        out
    }

    /// Ends decoding. A dangling partial sequence becomes one U+FFFD.
    pub fn flush(&mut self) -> String {
        if self.carry.is_empty() {
            return String::new();
        }
        self.carry.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }

    /// Number of bytes currently held back.
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_split_across_chunks_decodes_once_complete() {
        let bytes = "café".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 1);
        let mut decoder = ChunkDecoder::new();
        assert_eq!(decoder.feed(head), "caf");
        assert_eq!(decoder.pending_bytes(), 1);
        assert_eq!(decoder.feed(tail), "é");
        assert_eq!(decoder.pending_bytes(), 0);
        assert_eq!(decoder.flush(), "");
    }

    #[test]
    fn four_byte_character_fed_one_byte_at_a_time() {
        let mut decoder = ChunkDecoder::new();
        let mut out = String::new();
        for byte in "🎲!".as_bytes() {
            out.push_str(&decoder.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(out, "🎲!");
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut decoder = ChunkDecoder::new();
        assert_eq!(decoder.feed(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn flush_replaces_truncated_sequence() {
        let mut decoder = ChunkDecoder::new();
        assert_eq!(decoder.feed(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.flush(), "\u{FFFD}");
        assert_eq!(decoder.flush(), "");
    }
}
