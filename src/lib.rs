//! # mdstream
//!
//! Stream PDF-to-Markdown conversions from a remote service.
//!
//! ## Why this crate?
//!
//! Converting a large document on a remote service takes long enough that a
//! blocking request gives the caller nothing to show. This crate is the
//! client-side protocol engine for a conversion backend: it submits a
//! document, consumes the chunked response as it arrives, reconstructs the
//! Markdown incrementally (UTF-8 safe across arbitrary chunk boundaries),
//! separates the optional metadata preamble from payload, and keeps status
//! and throughput statistics consistent the whole way — including when the
//! stream breaks mid-transfer, where everything received so far stays
//! available.
//!
//! ## Ingestion Overview
//!
//! ```text
//! payload
//!  │
//!  ├─ 1. Submit      multipart upload or JSON body, batch or streaming
//!  ├─ 2. Decode      raw byte chunks → text, carry-over for split chars
//!  ├─ 3. Preamble    optional `data: {json}` metadata frame (first chunk)
//!  ├─ 4. Accumulate  append-only session buffer + incremental deltas
//!  ├─ 5. Track       chunk/char counters, first-chunk latency, elapsed
//!  └─ 6. Transition  idle → submitting → streaming/processing → terminal
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdstream::{ClientConfig, DocumentPayload, TransferEngine, TransferMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = TransferEngine::with_http(ClientConfig::default())?;
//!     engine.probe_health().await?;
//!
//!     let payload = DocumentPayload::from_pdf_file("document.pdf").await?;
//!     let outcome = engine
//!         .transfer(payload, TransferMode::Streaming, true)
//!         .await?;
//!
//!     println!("{}", outcome.markdown);
//!     eprintln!(
//!         "{} chunks, {} chars, {:?}",
//!         outcome.chunk_count, outcome.char_count, outcome.elapsed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdstream` binary (clap + anyhow + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mdstream = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod observer;
pub mod output;
pub mod service;
pub mod session;
pub mod stats;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_BASE_URL};
pub use engine::TransferEngine;
pub use error::ConvertError;
pub use ingest::accumulate::StreamAccumulator;
pub use ingest::decode::Utf8ChunkDecoder;
pub use ingest::preamble::{parse_metadata_frame, MetadataFrame};
pub use observer::{NoopObserver, ObserverHandle, TransferObserver};
pub use output::{BatchResponse, HealthReport, TransferOutcome};
pub use service::{ChunkStream, ConversionService, DocumentPayload, HttpConversionService};
pub use session::{SourceInfo, StatusSnapshot, TransferMode, TransferStatus};
pub use stats::{format_duration, ProgressTracker};
