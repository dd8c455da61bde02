//! Result types returned to callers.
//!
//! [`BatchResponse`] is the normalised single-round-trip result: both of the
//! service's batch endpoints (document upload and markdown cleaning) reduce
//! to the same shape, so callers never branch on which endpoint served them.
//! [`TransferOutcome`] is the final value of a whole session — batch or
//! streaming — captured when the state machine enters a terminal state.

use crate::ingest::preamble::MetadataFrame;
use crate::session::{SourceInfo, TransferStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Normalised result of a batch submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Whether the service reported success.
    pub succeeded: bool,
    /// Source filename as reported by the service (upload endpoints only).
    pub filename: Option<String>,
    /// The converted (and possibly cleaned) Markdown.
    pub text: String,
    /// The raw conversion output before cleaning, when the service sent it.
    pub raw_text: Option<String>,
    /// Whether LLM cleaning ran on the remote side.
    pub cleaned_with_llm: bool,
    /// Character length of `text` as reported by the service.
    pub content_length: u64,
}

/// Liveness report from the conversion service.
///
/// The probe is considered successful when the HTTP round trip succeeds;
/// the fields are informational detail for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub api: String,
    #[serde(default)]
    pub vllm: Option<String>,
}

/// Final value of a completed (terminal) transfer session.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Terminal status the session ended in.
    pub status: TransferStatus,
    /// The accumulated Markdown. On failure this is the partial buffer —
    /// progress made before the break is preserved, not discarded.
    pub markdown: String,
    /// Metadata frame, when the stream opened with one.
    pub metadata: Option<MetadataFrame>,
    /// Identity of the submitted document.
    pub source: Option<SourceInfo>,
    /// Payload chunks received.
    pub chunk_count: u64,
    /// Payload characters received.
    pub char_count: u64,
    /// Total session duration.
    pub elapsed: Duration,
    /// Latency to the first payload chunk; `None` when no data ever arrived.
    pub first_chunk_latency: Option<Duration>,
    /// Error detail for `Failed` outcomes.
    pub error: Option<String>,
}

impl TransferOutcome {
    /// True when the session completed cleanly.
    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Succeeded
    }
}
