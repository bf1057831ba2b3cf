//! Tracer run metrics.
//!
//! Counters are always collected; they cost a handful of integer increments
//! per event. Per-frame summaries allocate and are only kept when
//! `Options::record_frames` is set.

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TraceMetrics {
    /// Events delivered to the tracer.
    pub events: usize,
    /// Frames created, the root included.
    pub frames_pushed: usize,
    /// Frames merged back into (or discarded on the way to) a parent.
    pub frames_popped: usize,
    /// Popped frames whose accesses were dropped because they failed.
    pub failed_discarded: usize,
    /// Events that matched no frame on the stack.
    pub orphaned_events: usize,
    /// Deepest stack seen.
    pub max_depth: usize,
    /// Events whose location matched a configured breakpoint.
    pub breakpoint_hits: usize,
}

/// What one frame looked like when it left the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSummary {
    pub query_id: u64,
    pub parent_id: u64,
    /// Rule name, when the frame was entered for a rule.
    pub rule: Option<String>,
    pub failed: bool,
    /// Number of variables with provenance.
    pub tracked_vars: usize,
    pub accesses: Vec<String>,
    /// Input locations the rule's value came from.
    pub returns: Vec<String>,
}
