//! Input-access tracing.
//!
//! [`InputTracer`] is a [`QueryTracer`]: the engine hands it every trace event
//! of one evaluation, in order, and afterwards [`InputTracer::accesses`] holds
//! the input paths read on derivations that succeeded.
//!
//! ## How the parts work together
//!
//! ```text
//! Event ──▶ InputTracer::trace_event            (tracer.rs)
//!             - seed root frame on first event
//!             - breakpoint check (log + count only)
//!             - FrameStack::position_for         (stack.rs)
//!             - pop + merge down to that frame
//!             - push a child seeded from the parent's next input
//!                       │
//!                       v
//!           Frame::handle_event                  (frame.rs)
//!             - Enter / Exit / Fail bookkeeping
//!             - bind provenance on assignment    ──▶ ProvenanceMap (provenance.rs)
//!             - record accesses                  ──▶ render        (render.rs)
//!             - compute the child's input (`with input as ...`)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `render.rs`: turns symbolic references into dotted paths using locals.
//! - `provenance.rs`: per-variable records and prefix expansion.
//! - `frame.rs`: one rule body activation and its event handling.
//! - `stack.rs`: the active call chain and merge-on-pop.
//! - `metrics.rs`: counters and per-frame summaries for reports.
//!
//! ## Debugging
//!
//! Everything of interest is logged through `tracing`: pushes and pops at
//! `debug`, every rendered access at `trace`, dropped events at `warn`.

#[path = "tracer/frame.rs"]
mod frame;
#[path = "tracer/metrics.rs"]
mod metrics;
#[path = "tracer/provenance.rs"]
mod provenance;
#[path = "tracer/render.rs"]
mod render;
#[path = "tracer/stack.rs"]
mod stack;


pub use frame::{Frame, RuleReturn};
pub use metrics::{FrameSummary, TraceMetrics};
pub use provenance::{InputRef, ProvenanceMap};
pub use render::{Unresolved, is_ancestor, render, substitute_locals};

use crate::api::{Breakpoint, Options};
use crate::event::{Event, QueryTracer, TraceConfig};
use stack::FrameStack;
use std::collections::BTreeSet;
use tracing::{info, warn};

static NO_ACCESSES: BTreeSet<String> = BTreeSet::new();

#[derive(Debug, Clone, Default)]
pub struct InputTracer {
    stack: FrameStack,
    breakpoints: Vec<Breakpoint>,
    metrics: TraceMetrics,
    history: Option<Vec<FrameSummary>>,
}

impl InputTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: &Options) -> Self {
        InputTracer {
            stack: FrameStack::new(),
            breakpoints: options.breakpoints.clone(),
            metrics: TraceMetrics::default(),
            history: options.record_frames.then(Vec::new),
        }
    }

    /// Input paths read by the root frame and every successful frame merged
    /// into it so far.
    pub fn accesses(&self) -> &BTreeSet<String> {
        self.stack.root().map_or(&NO_ACCESSES, Frame::accesses)
    }

    pub fn root(&self) -> Option<&Frame> {
        self.stack.root()
    }

    /// The innermost active frame.
    pub fn current(&self) -> Option<&Frame> {
        self.stack.top()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn metrics(&self) -> &TraceMetrics {
        &self.metrics
    }

    /// Summaries of popped frames, oldest first. Empty unless frame recording
    /// was enabled.
    pub fn take_history(&mut self) -> Vec<FrameSummary> {
        self.history.as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn push(&mut self, frame: Frame) {
        self.stack.push(frame);
        self.metrics.frames_pushed += 1;
        self.metrics.max_depth = self.metrics.max_depth.max(self.stack.len());
    }

    fn check_breakpoints(&mut self, event: &Event) {
        let Some(location) = &event.location else {
            return;
        };
        if self.breakpoints.iter().any(|bp| bp.matches(location)) {
            self.metrics.breakpoint_hits += 1;
            info!(
                file = %location.file,
                row = location.row,
                query_id = event.query_id,
                op = ?event.op,
                depth = self.stack.len(),
                "breakpoint hit"
            );
        }
    }

    /// Bring the stack in line with the event. Returns false when the event
    /// belongs to no active frame.
    fn sync_stack(&mut self, event: &Event) -> bool {
        let Some(position) = self.stack.position_for(event) else {
            return false;
        };

        while self.stack.len() > position + 1 {
            let Some(popped) = self.stack.pop_merge() else {
                break;
            };
            self.metrics.frames_popped += 1;
            if popped.is_failed() {
                self.metrics.failed_discarded += 1;
            }
            if let Some(history) = &mut self.history {
                history.push(popped.summary());
            }
        }

        let child = match self.stack.top() {
            Some(top) if top.id() != event.query_id => {
                Some(Frame::new(event.query_id, top.id(), top.next_input().map(<[InputRef]>::to_vec)))
            }
            _ => None,
        };
        if let Some(child) = child {
            self.push(child);
        }
        true
    }
}

impl QueryTracer for InputTracer {
    fn enabled(&self) -> bool {
        true
    }

    fn config(&self) -> TraceConfig {
        TraceConfig::PLUG_LOCAL_VARS
    }

    fn trace_event(&mut self, event: &Event) {
        self.metrics.events += 1;
        if self.stack.is_empty() {
            self.push(Frame::root(event.query_id, event.parent_id));
        }
        self.check_breakpoints(event);

        if !self.sync_stack(event) {
            self.metrics.orphaned_events += 1;
            warn!(
                query_id = event.query_id,
                parent_id = event.parent_id,
                op = ?event.op,
                "event matches no active frame; dropping"
            );
            return;
        }
        if let Some(top) = self.stack.top_mut() {
            top.handle_event(event);
        }
    }
}
