//! Transfer lifecycle state: one state machine instead of a pile of flags.
//!
//! A transfer's observable condition is exactly one [`TransferStatus`] at any
//! instant, together with a human-readable message and an optional detail
//! string. Collapsing the independent streaming/processing/health flags a UI
//! would otherwise juggle into a single enum makes inconsistent combinations
//! unrepresentable.
//!
//! Transitions are validated: a request that the table does not allow —
//! in particular any transition out of a terminal state — is rejected and
//! logged, never applied. The only way out of a terminal state is replacing
//! the session wholesale via [`crate::engine::TransferEngine::reset`] (or an
//! implicit replacement when a new transfer starts).

use crate::ingest::accumulate::StreamAccumulator;
use crate::ingest::preamble::MetadataFrame;
use crate::stats::ProgressTracker;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// How the transfer's result is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransferMode {
    /// Chunked stream; partial results visible as they arrive. (default)
    #[default]
    Streaming,
    /// Single round trip; result arrives whole.
    Batch,
}

/// Lifecycle status of a transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// No operation submitted.
    Idle,
    /// Request dispatched, awaiting the first response bytes.
    Submitting,
    /// Payload actively arriving chunk by chunk.
    Streaming,
    /// Batch mode: awaiting the single response.
    Processing,
    /// Terminal: completed cleanly.
    Succeeded,
    /// Terminal: an in-flight error broke the transfer.
    Failed,
    /// Terminal: the caller abandoned the transfer. Not a failure.
    Cancelled,
    /// Terminal: the pre-flight dependency check failed before any transfer
    /// started.
    Unavailable,
}

impl TransferStatus {
    /// Terminal states admit no further transition except explicit reset.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Succeeded
                | TransferStatus::Failed
                | TransferStatus::Cancelled
                | TransferStatus::Unavailable
        )
    }

    /// Whether the state machine permits moving from `self` to `to`.
    fn allows(&self, to: TransferStatus) -> bool {
        use TransferStatus::*;
        match (self, to) {
            (Idle, Submitting) | (Idle, Unavailable) => true,
            // A stream can end (cleanly or not) before any payload chunk
            // promoted the session to Streaming.
            (Submitting, Streaming)
            | (Submitting, Processing)
            | (Submitting, Succeeded)
            | (Submitting, Failed)
            | (Submitting, Cancelled) => true,
            (Streaming, Succeeded) | (Streaming, Failed) | (Streaming, Cancelled) => true,
            (Processing, Succeeded) | (Processing, Failed) | (Processing, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStatus::Idle => "idle",
            TransferStatus::Submitting => "submitting",
            TransferStatus::Streaming => "streaming",
            TransferStatus::Processing => "processing",
            TransferStatus::Succeeded => "succeeded",
            TransferStatus::Failed => "failed",
            TransferStatus::Cancelled => "cancelled",
            TransferStatus::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Identity of the submitted source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    pub byte_size: u64,
}

/// A value view of the session at one instant.
///
/// Recomputed on every observed event; never stored independently of the
/// session it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub status: TransferStatus,
    /// Short human-readable headline, e.g. "Streaming completed successfully!".
    pub message: String,
    /// Longer free-form detail, e.g. "Processed 4213 characters in 2.3s".
    pub detail: String,
    /// Fraction of the expected raw content received, when the metadata
    /// frame supplied a raw length. Estimate only — cleaning can shrink the
    /// output below the raw length.
    pub progress: Option<f32>,
}

/// One end-to-end submit-and-observe transfer of a single payload.
///
/// Owned exclusively by the engine that created it; starting a new transfer
/// replaces the session wholesale, so no two sessions ever interleave state.
#[derive(Debug)]
pub struct TransferSession {
    pub(crate) status: TransferStatus,
    pub(crate) message: String,
    pub(crate) detail: String,
    pub(crate) source: Option<SourceInfo>,
    pub(crate) accumulator: StreamAccumulator,
    pub(crate) stats: ProgressTracker,
    pub(crate) metadata: Option<MetadataFrame>,
    pub(crate) last_error: Option<String>,
}

impl TransferSession {
    /// A fresh idle session with an empty buffer.
    pub fn idle() -> Self {
        Self {
            status: TransferStatus::Idle,
            message: "Ready to process documents".to_string(),
            detail: String::new(),
            source: None,
            accumulator: StreamAccumulator::new(),
            stats: ProgressTracker::start(),
            metadata: None,
            last_error: None,
        }
    }

    /// Apply a status transition with its observational message/detail pair.
    ///
    /// Returns `false` (and leaves the session untouched) when the state
    /// machine does not allow the move. Entering a terminal state freezes
    /// the session clock.
    pub fn transition(
        &mut self,
        to: TransferStatus,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> bool {
        if !self.status.allows(to) {
            warn!(from = %self.status, to = %to, "rejected status transition");
            return false;
        }
        self.status = to;
        self.message = message.into();
        self.detail = detail.into();
        if to.is_terminal() {
            self.stats.finish();
            self.accumulator.finalize();
        }
        true
    }

    /// Refresh the detail line without a status change.
    ///
    /// Purely observational; periodic progress updates use this so the
    /// status itself stays stable while streaming.
    pub fn update_detail(&mut self, detail: impl Into<String>) {
        self.detail = detail.into();
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn buffer(&self) -> &str {
        self.accumulator.buffer()
    }

    pub fn metadata(&self) -> Option<&MetadataFrame> {
        self.metadata.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Compute the current snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        let progress = self.metadata.as_ref().and_then(|m| {
            if m.raw_content_length == 0 {
                return None;
            }
            let ratio = self.stats.char_count() as f32 / m.raw_content_length as f32;
            Some(ratio.clamp(0.0, 1.0))
        });
        StatusSnapshot {
            status: self.status,
            message: self.message.clone(),
            detail: self.detail.clone(),
            progress,
        }
    }
}
