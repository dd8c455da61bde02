//! Observer trait for transfer lifecycle events.
//!
//! Inject an [`Arc<dyn TransferObserver>`] via
//! [`crate::config::ClientConfigBuilder::observer`] to receive real-time
//! events as the engine drives a transfer.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a WebSocket, a terminal
//! spinner, or a GUI re-render — without the library knowing anything about
//! how the host application communicates. Notification is decoupled from
//! storage: callbacks always fire *after* the session lock has been released,
//! with cloned data, so a slow observer can never stall the ingestion loop.

use crate::session::StatusSnapshot;
use std::sync::Arc;

/// Called by the engine as a transfer progresses.
///
/// Implementations must be `Send + Sync` (the drive loop runs on a spawned
/// task). All methods have default no-op implementations so callers only
/// override what they care about.
pub trait TransferObserver: Send + Sync {
    /// Called on every status transition and periodic detail refresh.
    fn on_status(&self, snapshot: &StatusSnapshot) {
        let _ = snapshot;
    }

    /// Called whenever payload content is appended to the session buffer.
    ///
    /// # Arguments
    /// * `delta`  — the newly appended text
    /// * `buffer` — the full buffer after the append
    fn on_content(&self, delta: &str, buffer: &str) {
        let _ = (delta, buffer);
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ObserverHandle = Arc<dyn TransferObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TransferStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver {
        statuses: AtomicUsize,
        chars: AtomicUsize,
    }

    impl TransferObserver for CountingObserver {
        fn on_status(&self, _snapshot: &StatusSnapshot) {
            self.statuses.fetch_add(1, Ordering::SeqCst);
        }

        fn on_content(&self, delta: &str, _buffer: &str) {
            self.chars.fetch_add(delta.chars().count(), Ordering::SeqCst);
        }
    }

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            status: TransferStatus::Streaming,
            message: "streaming".into(),
            detail: String::new(),
            progress: None,
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_status(&snapshot());
        obs.on_content("hello", "hello");
    }

    #[test]
    fn counting_observer_receives_events() {
        let obs = CountingObserver {
            statuses: AtomicUsize::new(0),
            chars: AtomicUsize::new(0),
        };
        obs.on_status(&snapshot());
        obs.on_content("ab", "ab");
        obs.on_content("cd", "abcd");
        assert_eq!(obs.statuses.load(Ordering::SeqCst), 1);
        assert_eq!(obs.chars.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let obs: ObserverHandle = Arc::new(NoopObserver);
        obs.on_status(&snapshot());
        obs.on_content("x", "x");
    }
}
