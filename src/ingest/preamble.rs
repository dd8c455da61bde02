//! Metadata-frame recognition in the first chunk of a stream.
//!
//! The conversion service may open a streamed response with a single
//! metadata line before any payload content:
//!
//! ```text
//! data: {"filename": "report.pdf", "raw_content_length": 48213}
//! ```
//!
//! Recognition is a parse-or-passthrough: the chunk is a metadata frame only
//! if it starts with the `data:` sentinel *and* the remainder parses as a
//! well-formed record with both expected fields. Anything else — wrong
//! prefix, malformed JSON, missing fields — means the whole chunk is
//! ordinary payload and is returned to the caller untouched. Failure is not
//! an error and has no side effects, so the engine can attempt the parse
//! exactly once on the first chunk and route everything after it straight to
//! accumulation.

use serde::{Deserialize, Serialize};

/// Sentinel prefix that opens a metadata frame.
pub const METADATA_SENTINEL: &str = "data:";

/// Structured preamble sent before payload content in streaming mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFrame {
    /// Source filename as reported by the remote side.
    pub filename: String,
    /// Length of the raw extracted content, before cleaning.
    pub raw_content_length: u64,
}

/// Attempt to interpret `chunk` as a metadata frame.
///
/// Returns `Some(frame)` when the chunk is structurally recognisable as a
/// metadata frame, `None` otherwise. Never fails; a `None` means the chunk
/// is payload content.
pub fn parse_metadata_frame(chunk: &str) -> Option<MetadataFrame> {
    let body = chunk.strip_prefix(METADATA_SENTINEL)?.trim();
    serde_json::from_str(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_frame_is_recognised() {
        let chunk = "data: {\"filename\":\"a.pdf\",\"raw_content_length\":120}\n";
        let frame = parse_metadata_frame(chunk).expect("frame should parse");
        assert_eq!(frame.filename, "a.pdf");
        assert_eq!(frame.raw_content_length, 120);
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let chunk = "data: {\"filename\":\"a.pdf\",\"raw_content_length\":7,\"model\":\"qwen\"}";
        assert!(parse_metadata_frame(chunk).is_some());
    }

    #[test]
    fn wrong_prefix_is_payload() {
        assert!(parse_metadata_frame("# A Heading\n").is_none());
        assert!(parse_metadata_frame("payload: {\"filename\":\"a\"}").is_none());
    }

    #[test]
    fn malformed_json_is_payload() {
        assert!(parse_metadata_frame("data: {not json at all").is_none());
        assert!(parse_metadata_frame("data: ").is_none());
    }

    #[test]
    fn missing_fields_are_payload() {
        assert!(parse_metadata_frame("data: {\"filename\":\"a.pdf\"}").is_none());
        assert!(parse_metadata_frame("data: {\"raw_content_length\":3}").is_none());
    }

    #[test]
    fn sentinel_without_space_still_parses() {
        let chunk = "data:{\"filename\":\"b.pdf\",\"raw_content_length\":0}";
        let frame = parse_metadata_frame(chunk).expect("frame should parse");
        assert_eq!(frame.filename, "b.pdf");
    }

    #[test]
    fn markdown_that_merely_mentions_data_is_payload() {
        // Payload whose first characters coincide with the sentinel but whose
        // remainder is prose, not a record.
        assert!(parse_metadata_frame("data: tables are described below\n").is_none());
    }
}
