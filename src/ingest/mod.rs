//! Ingestion stages for a streamed conversion response.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ decode ──▶ preamble ──▶ accumulate
//! (chunk)   (UTF-8)    (1st chunk)  (buffer + delta)
//! ```
//!
//! 1. [`decode`]     — incremental UTF-8 decoding, tolerant of multi-byte
//!    sequences split across chunk boundaries
//! 2. [`preamble`]   — recognise an optional `data:`-prefixed metadata frame
//!    in the first decoded chunk; parse-or-passthrough, never an error
//! 3. [`accumulate`] — append payload text to the session buffer, reporting
//!    the incremental delta

pub mod accumulate;
pub mod decode;
pub mod preamble;
