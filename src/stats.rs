//! Timing and throughput accounting for a transfer session.
//!
//! [`ProgressTracker`] consumes three kinds of events — session start (its
//! construction), payload chunk arrival, and session end — and derives the
//! numbers a caller wants to display: elapsed time, time-to-first-chunk, and
//! cumulative chunk/character counts.
//!
//! Elapsed time is computed on demand from the current instant while the
//! session is active and frozen once it ends. Time-to-first-chunk is captured
//! exactly once; it stays `None` for a session that ended without ever
//! receiving data, which distinguishes "no data ever arrived" from "data
//! arrived instantly".

use std::time::{Duration, Instant};

/// Throughput and timing statistics for one transfer session.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started_at: Instant,
    first_chunk_at: Option<Instant>,
    ended_at: Option<Instant>,
    chunk_count: u64,
    char_count: u64,
}

impl ProgressTracker {
    /// Start tracking a new session. The session clock starts now.
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            first_chunk_at: None,
            ended_at: None,
            chunk_count: 0,
            char_count: 0,
        }
    }

    /// Record the arrival of one payload chunk contributing `chars` characters.
    ///
    /// The first call captures the time-to-first-chunk; later calls leave it
    /// untouched.
    pub fn record_chunk(&mut self, chars: usize) {
        self.first_chunk_at.get_or_insert_with(Instant::now);
        self.chunk_count += 1;
        self.char_count += chars as u64;
    }

    /// Freeze the session clock. Idempotent: only the first call sets the
    /// end instant.
    pub fn finish(&mut self) {
        self.ended_at.get_or_insert_with(Instant::now);
    }

    /// True once [`finish`](Self::finish) has been called.
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Wall-clock time since session start: live while active, frozen once
    /// ended. Never negative.
    pub fn elapsed(&self) -> Duration {
        self.ended_at
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started_at)
    }

    /// Latency from session start to the first payload chunk, or `None` if
    /// no chunk has arrived (even for an already-ended session).
    pub fn first_chunk_latency(&self) -> Option<Duration> {
        self.first_chunk_at
            .map(|t| t.saturating_duration_since(self.started_at))
    }

    /// Number of payload chunks recorded so far.
    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Number of payload characters recorded so far.
    pub fn char_count(&self) -> u64 {
        self.char_count
    }

    /// A human-readable progress line, produced only on every `cadence`-th
    /// chunk.
    ///
    /// Purely a read-time formatting concern: counters are not touched, and
    /// calling this any number of times returns the same answer for the same
    /// state.
    pub fn progress_line(&self, cadence: u64) -> Option<String> {
        let cadence = cadence.max(1);
        if self.chunk_count == 0 || self.chunk_count % cadence != 0 {
            return None;
        }
        Some(format!(
            "Chunks received: {} | Time: {}",
            self.chunk_count,
            format_duration(self.elapsed())
        ))
    }
}

/// Render a duration the way a human wants to read it: `850ms`, `2.3s`,
/// `1m 12s`.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let secs = d.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn counters_accumulate() {
        let mut t = ProgressTracker::start();
        t.record_chunk(6);
        t.record_chunk(5);
        assert_eq!(t.chunk_count(), 2);
        assert_eq!(t.char_count(), 11);
    }

    #[test]
    fn first_chunk_latency_unset_without_chunks() {
        let mut t = ProgressTracker::start();
        assert!(t.first_chunk_latency().is_none());
        t.finish();
        // Ended with zero chunks: still unset.
        assert!(t.first_chunk_latency().is_none());
    }

    #[test]
    fn first_chunk_latency_set_once() {
        let mut t = ProgressTracker::start();
        t.record_chunk(1);
        let first = t.first_chunk_latency().expect("latency set");
        std::thread::sleep(Duration::from_millis(5));
        t.record_chunk(1);
        assert_eq!(t.first_chunk_latency(), Some(first));
    }

    #[test]
    fn elapsed_freezes_on_finish() {
        let mut t = ProgressTracker::start();
        t.finish();
        let frozen = t.elapsed();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(t.elapsed(), frozen);
        // finish() is idempotent
        t.finish();
        assert_eq!(t.elapsed(), frozen);
    }

    #[test]
    fn progress_line_respects_cadence() {
        let mut t = ProgressTracker::start();
        assert!(t.progress_line(10).is_none());
        for _ in 0..9 {
            t.record_chunk(1);
        }
        assert!(t.progress_line(10).is_none());
        t.record_chunk(1);
        let line = t.progress_line(10).expect("line at 10th chunk");
        assert!(line.contains("Chunks received: 10"), "got: {line}");
        // Read-only: repeat query gives the same answer, counters unchanged.
        assert!(t.progress_line(10).is_some());
        assert_eq!(t.chunk_count(), 10);
    }

    #[test]
    fn format_duration_ranges() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(2_300)), "2.3s");
        assert_eq!(format_duration(Duration::from_secs(72)), "1m 12s");
    }
}
