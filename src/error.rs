//! Error types for the mdstream library.
//!
//! A single fatal enum, [`ConvertError`], covers every way a transfer can
//! fail. The engine never lets one of these propagate to the caller's task:
//! each is caught at the drive-loop boundary and translated into a terminal
//! [`crate::session::TransferStatus`] with the error's message as the
//! human-readable detail. Partial output accumulated before the failure is
//! preserved — a broken stream does not wipe prior progress.
//!
//! [`ConvertError::Cancelled`] is special: it marks explicit abandonment by
//! the caller, which is terminal but not a failure for reporting purposes.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced by the mdstream library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Transport errors ──────────────────────────────────────────────────
    /// Network-level failure: connection refused, DNS, timeout, broken stream.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The service answered with a non-success HTTP status.
    ///
    /// The `detail` field carries the service's own error message when the
    /// body was a structured `{"detail": …}` record, or the raw status text
    /// otherwise.
    #[error("Conversion service returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },

    /// The conversion service could not be reached during the pre-flight
    /// health probe. Distinct from [`ConvertError::Transport`] so callers can
    /// tell "never started" apart from "started then broke".
    #[error("Conversion service is not available at '{base_url}'\nMake sure the backend is running, or pass --base-url.")]
    ServiceUnavailable { base_url: String },

    // ── Response errors ───────────────────────────────────────────────────
    /// A batch response arrived but did not conform to the expected shape
    /// (missing content field, non-JSON body, wrong types).
    #[error("Malformed response from conversion service: {detail}")]
    MalformedResponse { detail: String },

    /// Hard decoding failure. The chunk decoder is lenient (invalid byte
    /// sequences become replacement characters), so this only surfaces when
    /// decoding cannot proceed at all; it is fatal to the session.
    #[error("Failed to decode stream payload: {detail}")]
    Decode { detail: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// Content was appended to a session whose accumulator was already
    /// finalized.
    #[error("Transfer session is already closed")]
    SessionClosed,

    /// The caller abandoned the session. Terminal, but not a failure.
    #[error("Transfer cancelled")]
    Cancelled,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConvertError {
    /// True for errors raised by explicit caller abandonment.
    ///
    /// The engine reports these with the neutral `Cancelled` status instead
    /// of `Failed`.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ConvertError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_display() {
        let e = ConvertError::Transport {
            message: "connection refused".into(),
        };
        assert!(e.to_string().contains("connection refused"));
    }

    #[test]
    fn api_display_carries_status_and_detail() {
        let e = ConvertError::Api {
            status: 400,
            detail: "Only PDF files are supported".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("400"), "got: {msg}");
        assert!(msg.contains("Only PDF files are supported"));
    }

    #[test]
    fn malformed_response_display() {
        let e = ConvertError::MalformedResponse {
            detail: "missing field `cleaned_markdown`".into(),
        };
        assert!(e.to_string().contains("cleaned_markdown"));
    }

    #[test]
    fn cancelled_is_cancellation() {
        assert!(ConvertError::Cancelled.is_cancellation());
        assert!(!ConvertError::SessionClosed.is_cancellation());
    }
}
