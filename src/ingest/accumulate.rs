//! Append-only accumulation of decoded payload text.
//!
//! The session buffer is the ordered concatenation of every payload chunk
//! the stream delivered; it only ever grows while the session is active.
//! [`StreamAccumulator::finalize`] marks the end of input, after which any
//! further append is a logic error and is rejected rather than silently
//! applied — a closed session must never change content under an observer.

use crate::error::ConvertError;

/// Result of one append: the full buffer plus what this call added.
#[derive(Debug)]
pub struct AppendDelta<'a> {
    /// The complete buffer content after the append.
    pub buffer: &'a str,
    /// The text this append contributed.
    pub delta: &'a str,
}

/// Growable session buffer with an explicit end-of-input marker.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffer: String,
    finalized: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append payload text, returning the new full buffer and the delta.
    ///
    /// # Errors
    /// [`ConvertError::SessionClosed`] if [`finalize`](Self::finalize) was
    /// already called.
    pub fn append(&mut self, text: &str) -> Result<AppendDelta<'_>, ConvertError> {
        if self.finalized {
            return Err(ConvertError::SessionClosed);
        }
        let delta_start = self.buffer.len();
        self.buffer.push_str(text);
        Ok(AppendDelta {
            delta: &self.buffer[delta_start..],
            buffer: &self.buffer,
        })
    }

    /// Signal that no more input follows. Idempotent.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    /// True once the accumulator has been finalized.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Current buffer content.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume the accumulator, yielding the final buffer.
    pub fn into_buffer(self) -> String {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_ordered_concatenation() {
        let mut acc = StreamAccumulator::new();
        acc.append("Hello ").unwrap();
        let out = acc.append("World").unwrap();
        assert_eq!(out.buffer, "Hello World");
        assert_eq!(out.delta, "World");
    }

    #[test]
    fn length_is_monotonically_non_decreasing() {
        let mut acc = StreamAccumulator::new();
        let mut last = 0;
        for chunk in ["a", "", "bc", "", "def"] {
            acc.append(chunk).unwrap();
            assert!(acc.len() >= last);
            last = acc.len();
        }
        assert_eq!(acc.buffer(), "abcdef");
    }

    #[test]
    fn append_after_finalize_is_rejected() {
        let mut acc = StreamAccumulator::new();
        acc.append("content").unwrap();
        acc.finalize();
        let err = acc.append("more").unwrap_err();
        assert!(matches!(err, ConvertError::SessionClosed));
        // Buffer untouched by the rejected append.
        assert_eq!(acc.buffer(), "content");
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut acc = StreamAccumulator::new();
        acc.finalize();
        acc.finalize();
        assert!(acc.is_finalized());
        assert!(acc.is_empty());
    }

    #[test]
    fn into_buffer_yields_content() {
        let mut acc = StreamAccumulator::new();
        acc.append("partial").unwrap();
        acc.finalize();
        assert_eq!(acc.into_buffer(), "partial");
    }
}
