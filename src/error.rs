//! Errors raised at the crate boundary.
//!
//! Tracing itself never fails: malformed events only reduce how much
//! provenance is tracked. The fallible paths are reading a trace from disk or
//! stdin, parsing reference text, and parsing CLI breakpoint specs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid trace: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid trace event #{index}: {source}")]
    Event {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid reference `{text}`: {reason}")]
    InvalidRef { text: String, reason: String },

    #[error("invalid breakpoint `{0}` (expected FILE:ROW)")]
    InvalidBreakpoint(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
