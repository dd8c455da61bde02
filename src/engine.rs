//! The transfer engine: protocol driver for batch and streaming conversion.
//!
//! [`TransferEngine`] composes the ingestion stages into one lifecycle:
//! dispatch the request, consume the response (whole or chunk by chunk),
//! decode, recognise the optional metadata preamble, accumulate payload,
//! track progress, and walk the status state machine to a terminal state.
//!
//! ## Concurrency model
//!
//! One logical session at a time. The drive loop runs on a spawned task and
//! suspends only at the "read next chunk" point; every event application
//! takes the session lock briefly and releases it before any await or any
//! observer callback. Starting a new transfer (or cancelling) bumps a
//! generation counter — the drive loop re-checks the generation under the
//! lock before every mutation, so a late chunk from an abandoned stream is
//! discarded rather than applied to a newer session. The abandoned task is
//! also aborted, which drops its stream and releases the connection
//! promptly.
//!
//! ## Failure model
//!
//! Every error is absorbed here and becomes a terminal status with a
//! human-readable detail; none propagate to the caller's task. Partial
//! output accumulated before a failure stays visible.

use crate::config::ClientConfig;
use crate::error::ConvertError;
use crate::ingest::decode::Utf8ChunkDecoder;
use crate::ingest::preamble::parse_metadata_frame;
use crate::observer::ObserverHandle;
use crate::output::{HealthReport, TransferOutcome};
use crate::service::{ConversionService, DocumentPayload, HttpConversionService};
use crate::session::{SourceInfo, StatusSnapshot, TransferMode, TransferSession, TransferStatus};
use crate::stats::format_duration;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// Availability flag values (last health probe result).
const HEALTH_UNKNOWN: u8 = 0;
const HEALTH_OK: u8 = 1;
const HEALTH_BAD: u8 = 2;

/// Acquire a mutex, recovering the guard if a panicking task poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// State shared between the engine handle and the drive task.
struct Shared {
    session: Mutex<TransferSession>,
    /// Bumped on every start/cancel/reset; a drive loop whose generation is
    /// stale must not touch the session.
    generation: AtomicU64,
    /// Last health probe result, consulted before starting new transfers.
    availability: AtomicU8,
}

/// Orchestrates submit-and-observe transfers against a conversion service.
///
/// # Example
/// ```rust,no_run
/// use mdstream::{ClientConfig, DocumentPayload, TransferEngine, TransferMode};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::default();
/// let engine = TransferEngine::with_http(config)?;
/// let payload = DocumentPayload::from_pdf_file("document.pdf").await?;
/// let outcome = engine
///     .transfer(payload, TransferMode::Streaming, true)
///     .await?;
/// println!("{}", outcome.markdown);
/// # Ok(())
/// # }
/// ```
pub struct TransferEngine {
    service: Arc<dyn ConversionService>,
    config: ClientConfig,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TransferEngine {
    /// Create an engine over any [`ConversionService`] implementation.
    pub fn new(service: Arc<dyn ConversionService>, config: ClientConfig) -> Self {
        Self {
            service,
            config,
            shared: Arc::new(Shared {
                session: Mutex::new(TransferSession::idle()),
                generation: AtomicU64::new(0),
                availability: AtomicU8::new(HEALTH_UNKNOWN),
            }),
            task: Mutex::new(None),
        }
    }

    /// Create an engine backed by the HTTP service at `config.base_url`.
    pub fn with_http(config: ClientConfig) -> Result<Self, ConvertError> {
        let service = Arc::new(HttpConversionService::new(&config)?);
        Ok(Self::new(service, config))
    }

    // ── Observation ──────────────────────────────────────────────────────

    /// Current status snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        lock(&self.shared.session).snapshot()
    }

    /// Current session buffer content.
    pub fn buffer(&self) -> String {
        lock(&self.shared.session).buffer().to_string()
    }

    /// Final outcome, available once the session is terminal.
    pub fn outcome(&self) -> Option<TransferOutcome> {
        let session = lock(&self.shared.session);
        if !session.status().is_terminal() {
            return None;
        }
        Some(TransferOutcome {
            status: session.status(),
            markdown: session.buffer().to_string(),
            metadata: session.metadata().cloned(),
            source: session.source.clone(),
            chunk_count: session.stats.chunk_count(),
            char_count: session.stats.char_count(),
            elapsed: session.stats.elapsed(),
            first_chunk_latency: session.stats.first_chunk_latency(),
            error: session.last_error().map(String::from),
        })
    }

    // ── Health ───────────────────────────────────────────────────────────

    /// Probe the conversion service and update the availability flag.
    ///
    /// The probe shares no mutable state with an active transfer; it only
    /// records the flag consulted before new transfers start. A failed probe
    /// moves an idle session to `Unavailable` so callers can distinguish
    /// "never started" from "started then broke".
    pub async fn probe_health(&self) -> Result<HealthReport, ConvertError> {
        match self.service.probe_health().await {
            Ok(report) => {
                self.shared.availability.store(HEALTH_OK, Ordering::SeqCst);
                debug!(api = %report.api, "health probe succeeded");
                Ok(report)
            }
            Err(e) => {
                self.shared.availability.store(HEALTH_BAD, Ordering::SeqCst);
                warn!("health probe failed: {e}");
                let snap = {
                    let mut session = lock(&self.shared.session);
                    if session.status() == TransferStatus::Idle {
                        session.transition(
                            TransferStatus::Unavailable,
                            "Backend service is not available",
                            format!(
                                "Make sure the conversion service is running at {}",
                                self.config.base_url
                            ),
                        );
                        Some(session.snapshot())
                    } else {
                        None
                    }
                };
                if let Some(ref snap) = snap {
                    emit_status(&self.config.observer, snap);
                }
                Err(e)
            }
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Start a new transfer, implicitly discarding any session in flight.
    ///
    /// Returns as soon as the drive task is spawned; progress arrives via
    /// the configured observer, [`snapshot`](Self::snapshot) and
    /// [`buffer`](Self::buffer). Fails fast with
    /// [`ConvertError::ServiceUnavailable`] when the last health probe
    /// reported the service down.
    pub fn start_transfer(
        &self,
        payload: DocumentPayload,
        mode: TransferMode,
        clean: bool,
    ) -> Result<(), ConvertError> {
        if self.shared.availability.load(Ordering::SeqCst) == HEALTH_BAD {
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            self.abort_task();
            let snap = {
                let mut session = lock(&self.shared.session);
                *session = TransferSession::idle();
                session.transition(
                    TransferStatus::Unavailable,
                    "Backend service is not available",
                    format!(
                        "Make sure the conversion service is running at {}",
                        self.config.base_url
                    ),
                );
                session.snapshot()
            };
            emit_status(&self.config.observer, &snap);
            return Err(ConvertError::ServiceUnavailable {
                base_url: self.config.base_url.clone(),
            });
        }

        // Invalidate any in-flight loop before touching the session: a drive
        // task holding a pending chunk read must see a stale generation.
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.abort_task();

        let source = SourceInfo {
            name: payload.name().to_string(),
            byte_size: payload.byte_size(),
        };
        info!(file = %source.name, bytes = source.byte_size, ?mode, "starting transfer");

        let snap = {
            let mut session = lock(&self.shared.session);
            *session = TransferSession::idle();
            session.source = Some(source.clone());
            let message = match mode {
                TransferMode::Streaming => "Uploading and processing with streaming...",
                TransferMode::Batch => "Uploading and processing...",
            };
            session.transition(
                TransferStatus::Submitting,
                message,
                format!("Processing {} ({} bytes)", source.name, source.byte_size),
            );
            session.snapshot()
        };
        emit_status(&self.config.observer, &snap);

        let drive = Drive {
            service: Arc::clone(&self.service),
            shared: Arc::clone(&self.shared),
            observer: self.config.observer.clone(),
            cadence: self.config.status_cadence,
            generation,
        };
        let handle = tokio::spawn(async move {
            match mode {
                TransferMode::Batch => drive.run_batch(payload, clean).await,
                TransferMode::Streaming => drive.run_streaming(payload).await,
            }
        });
        *lock(&self.task) = Some(handle);
        Ok(())
    }

    /// Run a transfer to completion and return its outcome.
    ///
    /// Convenience over [`start_transfer`](Self::start_transfer) +
    /// [`join`](Self::join) for callers that don't need concurrent control.
    pub async fn transfer(
        &self,
        payload: DocumentPayload,
        mode: TransferMode,
        clean: bool,
    ) -> Result<TransferOutcome, ConvertError> {
        self.start_transfer(payload, mode, clean)?;
        self.join().await;
        self.outcome().ok_or(ConvertError::Cancelled)
    }

    /// Abandon the in-flight session.
    ///
    /// The drive task is aborted (dropping its stream and releasing the
    /// connection), and the session moves to the neutral terminal
    /// `Cancelled` state. The partial buffer is preserved. No-op when no
    /// transfer is active.
    pub fn cancel(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.abort_task();
        let snap = {
            let mut session = lock(&self.shared.session);
            let status = session.status();
            if status == TransferStatus::Idle || status.is_terminal() {
                None
            } else {
                session.last_error = Some(ConvertError::Cancelled.to_string());
                session.transition(
                    TransferStatus::Cancelled,
                    "Transfer cancelled",
                    "Cancelled before completion",
                );
                Some(session.snapshot())
            }
        };
        if let Some(ref snap) = snap {
            info!("transfer cancelled");
            emit_status(&self.config.observer, snap);
        }
    }

    /// Clear the session entirely and return to idle.
    ///
    /// Allowed from any state; an active transfer is cancelled first.
    pub fn reset(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.abort_task();
        let snap = {
            let mut session = lock(&self.shared.session);
            *session = TransferSession::idle();
            session.snapshot()
        };
        emit_status(&self.config.observer, &snap);
    }

    /// Await completion of the current drive task, if any.
    pub async fn join(&self) {
        let handle = lock(&self.task).take();
        if let Some(handle) = handle {
            // An aborted task resolves with a JoinError; either way the
            // session already carries the terminal state.
            let _ = handle.await;
        }
    }

    fn abort_task(&self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }
}

impl Drop for TransferEngine {
    fn drop(&mut self) {
        self.abort_task();
    }
}

// ── Drive loop ───────────────────────────────────────────────────────────

/// Everything a spawned drive task needs, detached from the engine handle.
struct Drive {
    service: Arc<dyn ConversionService>,
    shared: Arc<Shared>,
    observer: Option<ObserverHandle>,
    cadence: u64,
    generation: u64,
}

impl Drive {
    /// Run `f` against the session, unless this drive has been superseded.
    ///
    /// The generation check happens under the session lock — the one place
    /// that makes "late chunk from an abandoned stream" and "new session
    /// started" mutually exclusive.
    fn with_session<R>(&self, f: impl FnOnce(&mut TransferSession) -> R) -> Option<R> {
        let mut guard = lock(&self.shared.session);
        if self.shared.generation.load(Ordering::SeqCst) != self.generation {
            return None;
        }
        Some(f(&mut guard))
    }

    /// Terminal failure: record the error and transition.
    fn fail(&self, headline: &str, err: ConvertError) {
        warn!("transfer failed: {err}");
        let snap = self.with_session(|session| {
            session.last_error = Some(err.to_string());
            session.transition(TransferStatus::Failed, headline, err.to_string());
            session.snapshot()
        });
        if let Some(ref snap) = snap {
            emit_status(&self.observer, snap);
        }
    }

    // ── Batch mode ───────────────────────────────────────────────────────

    async fn run_batch(self, payload: DocumentPayload, clean: bool) {
        let snap = self.with_session(|session| {
            let detail = session.detail.clone();
            session.transition(TransferStatus::Processing, "Uploading and processing...", detail);
            session.snapshot()
        });
        match snap {
            Some(ref snap) => emit_status(&self.observer, snap),
            None => return,
        }

        match self.service.submit_batch(&payload, clean).await {
            Ok(response) => {
                let applied = self.with_session(|session| {
                    // The whole result is one payload contribution.
                    if session.accumulator.append(&response.text).is_err() {
                        return None;
                    }
                    session.stats.record_chunk(response.text.chars().count());
                    let cleaning = if response.cleaned_with_llm {
                        "with LLM cleaning"
                    } else {
                        "without LLM cleaning"
                    };
                    session.transition(
                        TransferStatus::Succeeded,
                        "Processing completed successfully!",
                        String::new(),
                    );
                    let detail = format!(
                        "Processed {} characters in {} {}",
                        response.content_length,
                        format_duration(session.stats.elapsed()),
                        cleaning
                    );
                    session.update_detail(detail);
                    Some((session.buffer().to_string(), session.snapshot()))
                });
                if let Some(Some((buffer, snap))) = applied {
                    info!(chars = buffer.len(), "batch transfer complete");
                    emit_content(&self.observer, &response.text, &buffer);
                    emit_status(&self.observer, &snap);
                }
            }
            Err(e) => self.fail("Processing failed", e),
        }
    }

    // ── Streaming mode ───────────────────────────────────────────────────

    async fn run_streaming(self, payload: DocumentPayload) {
        let mut stream = match self.service.submit_streaming(&payload).await {
            Ok(stream) => stream,
            Err(e) => {
                self.fail("Streaming failed", e);
                return;
            }
        };

        let mut decoder = Utf8ChunkDecoder::new();
        // The metadata lookahead is attempted at most once, on the first
        // decoded text the stream yields.
        let mut awaiting_preamble = true;

        loop {
            match stream.next().await {
                Some(Ok(bytes)) => {
                    let text = decoder.decode(&bytes);
                    if text.is_empty() {
                        // Chunk ended mid-character; nothing decodable yet.
                        continue;
                    }
                    if std::mem::take(&mut awaiting_preamble) {
                        if let Some(frame) = parse_metadata_frame(&text) {
                            debug!(file = %frame.filename, raw = frame.raw_content_length, "metadata frame received");
                            let snap = self.with_session(|session| {
                                session.update_detail(format!(
                                    "File: {} | Raw content: {} chars",
                                    frame.filename, frame.raw_content_length
                                ));
                                session.metadata = Some(frame);
                                session.snapshot()
                            });
                            match snap {
                                Some(ref snap) => emit_status(&self.observer, snap),
                                None => return,
                            }
                            continue;
                        }
                    }
                    if !self.apply_payload(&text) {
                        // Superseded: drop the stream without touching state.
                        return;
                    }
                }
                Some(Err(e)) => {
                    self.fail("Streaming failed", e);
                    return;
                }
                None => break,
            }
        }

        // Clean end of stream: flush the decoder, then close the session.
        let tail = decoder.finish();
        if !tail.is_empty() && !self.apply_payload(&tail) {
            return;
        }
        let snap = self.with_session(|session| {
            session.accumulator.finalize();
            session.stats.finish();
            session.transition(
                TransferStatus::Succeeded,
                "Streaming completed successfully!",
                String::new(),
            );
            let detail = format!(
                "Processed {} characters in {}",
                session.stats.char_count(),
                format_duration(session.stats.elapsed())
            );
            session.update_detail(detail);
            session.snapshot()
        });
        if let Some(ref snap) = snap {
            info!("streaming transfer complete");
            emit_status(&self.observer, snap);
        }
    }

    /// Append one payload contribution and account for it.
    ///
    /// Returns `false` when this drive has been superseded and must stop.
    fn apply_payload(&self, text: &str) -> bool {
        let applied = self.with_session(|session| {
            if session.status() == TransferStatus::Submitting {
                let detail = session.detail.clone();
                session.transition(
                    TransferStatus::Streaming,
                    "Receiving converted markdown...",
                    detail,
                );
            }
            if session.accumulator.append(text).is_err() {
                // Session already closed; treat like supersession.
                return None;
            }
            session.stats.record_chunk(text.chars().count());
            if let Some(line) = session.stats.progress_line(self.cadence) {
                session.update_detail(line);
            }
            Some((session.buffer().to_string(), session.snapshot()))
        });
        match applied.flatten() {
            Some((buffer, snap)) => {
                emit_content(&self.observer, text, &buffer);
                emit_status(&self.observer, &snap);
                true
            }
            None => false,
        }
    }
}

// ── Observer dispatch ────────────────────────────────────────────────────
// Callbacks run outside the session lock, always on cloned data.

fn emit_status(observer: &Option<ObserverHandle>, snapshot: &StatusSnapshot) {
    if let Some(obs) = observer {
        obs.on_status(snapshot);
    }
}

fn emit_content(observer: &Option<ObserverHandle>, delta: &str, buffer: &str) {
    if let Some(obs) = observer {
        obs.on_content(delta, buffer);
    }
}
