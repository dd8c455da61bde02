//! Incremental UTF-8 decoding of raw byte chunks.
//!
//! ## Why not decode chunk-by-chunk with `from_utf8_lossy`?
//!
//! The transport delivers byte chunks at arbitrary boundaries: a multi-byte
//! character can be split so its first bytes end one chunk and the rest open
//! the next. A naive per-chunk lossy decode would corrupt every such
//! character into replacement glyphs. [`Utf8ChunkDecoder`] instead carries
//! the trailing incomplete sequence (at most 3 bytes) across calls and
//! prepends it to the next chunk, so a character is only ever decoded whole.
//!
//! Genuinely invalid byte sequences become `U+FFFD` replacement characters;
//! decoding itself never fails.

/// Streaming UTF-8 decoder with carry-over for split multi-byte sequences.
///
/// Call [`decode`](Self::decode) for each arriving chunk and
/// [`finish`](Self::finish) exactly once at end-of-stream to flush any
/// bytes still held back.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    /// Trailing bytes of an incomplete sequence, waiting for the next chunk.
    carry: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning the maximal valid text available.
    ///
    /// Text held back from a previous call is prepended first. A trailing
    /// sequence that could still be completed by the next chunk is buffered
    /// rather than emitted.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut pending = std::mem::take(&mut self.carry);
        pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(pending.len());
        let mut rest = pending.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    if let Ok(s) = std::str::from_utf8(valid) {
                        out.push_str(s);
                    }
                    match e.error_len() {
                        // Invalid sequence of known length: replace and move on.
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        // Incomplete sequence at the end: hold it for the
                        // next chunk.
                        None => {
                            self.carry = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush any held-back bytes at end-of-stream.
    ///
    /// A sequence that never completed is decoded with the replacement
    /// policy. After this call the decoder is empty and reusable.
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            return String::new();
        }
        let carry = std::mem::take(&mut self.carry);
        String::from_utf8_lossy(&carry).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decode `bytes` split at every possible boundary set produced by
    /// `chunk_size` and compare against whole-buffer decoding.
    fn decode_in_chunks(bytes: &[u8], chunk_size: usize) -> String {
        let mut decoder = Utf8ChunkDecoder::new();
        let mut out = String::new();
        for chunk in bytes.chunks(chunk_size) {
            out.push_str(&decoder.decode(chunk));
        }
        out.push_str(&decoder.finish());
        out
    }

    #[test]
    fn ascii_passthrough() {
        let mut d = Utf8ChunkDecoder::new();
        assert_eq!(d.decode(b"Hello "), "Hello ");
        assert_eq!(d.decode(b"World"), "World");
        assert_eq!(d.finish(), "");
    }

    #[test]
    fn multibyte_split_across_chunks() {
        // "日本語" is 9 bytes; split mid-character at every position.
        let text = "日本語";
        let bytes = text.as_bytes();
        for size in 1..=bytes.len() {
            assert_eq!(
                decode_in_chunks(bytes, size),
                text,
                "chunk size {size} corrupted the text"
            );
        }
    }

    #[test]
    fn emoji_and_combining_marks_survive_any_boundary() {
        let text = "naïve café 🦀 — ✓";
        let bytes = text.as_bytes();
        for size in 1..=bytes.len() {
            assert_eq!(decode_in_chunks(bytes, size), text);
        }
    }

    #[test]
    fn split_character_emitted_only_when_complete() {
        let mut d = Utf8ChunkDecoder::new();
        let bytes = "é".as_bytes(); // 2 bytes
        assert_eq!(d.decode(&bytes[..1]), "");
        assert_eq!(d.decode(&bytes[1..]), "é");
    }

    #[test]
    fn invalid_bytes_become_replacement_chars() {
        let mut d = Utf8ChunkDecoder::new();
        let out = d.decode(&[b'a', 0xFF, b'b']);
        assert_eq!(out, "a\u{FFFD}b");
    }

    #[test]
    fn truncated_sequence_flushed_lossily_at_finish() {
        let mut d = Utf8ChunkDecoder::new();
        // First two bytes of a 3-byte character, then the stream ends.
        let bytes = "日".as_bytes();
        assert_eq!(d.decode(&bytes[..2]), "");
        let flushed = d.finish();
        assert!(flushed.contains('\u{FFFD}'), "got: {flushed:?}");
    }

    #[test]
    fn finish_on_clean_state_is_empty() {
        let mut d = Utf8ChunkDecoder::new();
        d.decode("complete".as_bytes());
        assert_eq!(d.finish(), "");
    }
}
