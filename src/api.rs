use crate::event::{Event, Location, QueryTracer};
use crate::tracer::{FrameSummary, InputTracer, RuleReturn, TraceMetrics};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::io::Read;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Options that affect tracing.
///
/// Nothing here changes which accesses are reported; both knobs only add
/// visibility.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Source locations to log (at `info`) and count when an event reaches them.
    pub breakpoints: Vec<Breakpoint>,
    /// Keep a [`FrameSummary`] for every frame that leaves the stack.
    pub record_frames: bool,
}

/// A `FILE:ROW` source location to watch for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub file: String,
    pub row: usize,
}

impl Breakpoint {
    pub fn new(file: impl Into<String>, row: usize) -> Self {
        Breakpoint { file: file.into(), row }
    }

    pub fn matches(&self, location: &Location) -> bool {
        self.row == location.row && self.file == location.file
    }
}

impl FromStr for Breakpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidBreakpoint(s.to_string());
        let (file, row) = s.rsplit_once(':').ok_or_else(invalid)?;
        let row = row.trim().parse::<usize>().map_err(|_| invalid())?;
        if file.trim().is_empty() {
            return Err(invalid());
        }
        Ok(Breakpoint::new(file.trim(), row))
    }
}

/// Result from [`analyze`] and [`analyze_with`].
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Input paths read on successful derivations, sorted.
    pub accesses: BTreeSet<String>,
    /// Time spent replaying the trace.
    pub elapsed: Duration,
}

/// Additional details returned by [`analyze_verbose_with`].
#[derive(Debug, Clone)]
pub struct AnalysisDetails {
    pub metrics: TraceMetrics,
    /// Popped frames in pop order, followed by the root frame.
    pub frames: Vec<FrameSummary>,
    /// Return provenance of the rules evaluated directly under the root.
    pub returns: Vec<RuleReturn>,
}

/// Result from [`analyze_verbose_with`].
#[derive(Debug, Clone)]
pub struct AnalysisVerbose {
    pub accesses: BTreeSet<String>,
    pub elapsed: Duration,
    pub details: AnalysisDetails,
}

/// Trace `events` with default [`Options`].
///
/// # Example
/// ```
/// use reftrace::{analyze, Event, Expr, Node, Op, Term};
///
/// let enabled = Term::Ref("input.enabled".parse().unwrap());
/// let events = vec![Event::new(Op::Eval, 1, 0, Node::Expr(Expr::term(enabled)))];
///
/// let out = analyze(&events);
/// assert_eq!(out.accesses.into_iter().collect::<Vec<_>>(), vec!["input.enabled"]);
/// ```
pub fn analyze(events: &[Event]) -> Analysis {
    analyze_with(events, &Options::default())
}

pub fn analyze_with(events: &[Event], options: &Options) -> Analysis {
    let start = Instant::now();
    let mut tracer = InputTracer::with_options(options);
    replay(&mut tracer, events);

    Analysis { accesses: tracer.accesses().clone(), elapsed: start.elapsed() }
}

/// Trace `events` and return metrics and frame summaries alongside the
/// accesses. Frame recording is forced on.
pub fn analyze_verbose_with(events: &[Event], options: &Options) -> AnalysisVerbose {
    let start = Instant::now();
    let options = Options { record_frames: true, ..options.clone() };
    let mut tracer = InputTracer::with_options(&options);
    replay(&mut tracer, events);
    let elapsed = start.elapsed();

    let mut frames = tracer.take_history();
    frames.extend(tracer.root().map(|root| root.summary()));
    let returns = tracer.root().map(|root| root.returns().to_vec()).unwrap_or_default();

    let details = AnalysisDetails { metrics: tracer.metrics().clone(), frames, returns };
    AnalysisVerbose { accesses: tracer.accesses().clone(), elapsed, details }
}

/// Feed `events` to `tracer` in order. Nothing is delivered to a disabled
/// tracer.
pub fn replay<T: QueryTracer + ?Sized>(tracer: &mut T, events: &[Event]) {
    if !tracer.enabled() {
        return;
    }
    for event in events {
        tracer.trace_event(event);
    }
}

/// Read a recorded trace: either one JSON array of events, or a stream of
/// event objects (one per line, or just concatenated).
pub fn read_events<R: Read>(mut reader: R) -> Result<Vec<Event>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(&text)?);
    }
    serde_json::Deserializer::from_str(&text)
        .into_iter::<Event>()
        .enumerate()
        .map(|(index, event)| event.map_err(|source| Error::Event { index, source }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::event::TraceConfig;
    use crate::testing::{assign, enter, enter_rule, eval, exit, rt, v};
    use crate::Locals;

    fn region_trace() -> Vec<Event> {
        vec![
            enter(1, 0),
            enter_rule(2, 1, "region", v("r")),
            eval(2, 1, assign(v("r"), rt("input.region")), Locals::new()),
            exit(2, 1),
            eval(1, 0, Expr::term(rt("data.done")), Locals::new()),
        ]
    }

    #[test]
    fn analyze_returns_root_accesses() {
        let out = analyze(&region_trace());
        assert_eq!(out.accesses, BTreeSet::from(["input.region".to_string()]));
        assert!(out.elapsed >= Duration::ZERO);
    }

    #[test]
    fn verbose_includes_metrics_frames_and_returns() {
        let out = analyze_verbose_with(&region_trace(), &Options::default());

        assert_eq!(out.details.metrics.events, 5);
        assert_eq!(out.details.metrics.frames_pushed, 2);
        assert_eq!(out.details.metrics.max_depth, 2);
        assert_eq!(out.details.frames.len(), 2);
        assert_eq!(out.details.frames[0].rule.as_deref(), Some("region"));
        assert_eq!(out.details.frames[1].query_id, 1);
        assert_eq!(out.details.returns[0].locations(), vec!["input.region"]);
    }

    #[test]
    fn breakpoint_parsing() {
        assert_eq!("policy.rego:12".parse::<Breakpoint>().unwrap(), Breakpoint::new("policy.rego", 12));
        assert_eq!("c:/p/x.rego:3".parse::<Breakpoint>().unwrap(), Breakpoint::new("c:/p/x.rego", 3));
        for bad in ["policy.rego", ":3", "policy.rego:x", "policy.rego:-1"] {
            assert!(matches!(bad.parse::<Breakpoint>(), Err(Error::InvalidBreakpoint(_))), "{bad}");
        }
    }

    #[test]
    fn read_events_accepts_array_and_lines() {
        let array = r#"[{"op": "Enter", "query_id": 1}, {"op": "Exit", "query_id": 1}]"#;
        let lines = "{\"op\": \"Enter\", \"query_id\": 1}\n{\"op\": \"Exit\", \"query_id\": 1}\n";

        let from_array = read_events(array.as_bytes()).unwrap();
        let from_lines = read_events(lines.as_bytes()).unwrap();
        assert_eq!(from_array.len(), 2);
        assert_eq!(from_array, from_lines);
        assert!(read_events("".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn read_events_reports_the_bad_event() {
        let lines = "{\"op\": \"Enter\", \"query_id\": 1}\n{\"op\": \"Exit\"}\n";
        match read_events(lines.as_bytes()) {
            Err(Error::Event { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    struct Disabled(usize);

    impl QueryTracer for Disabled {
        fn enabled(&self) -> bool {
            false
        }
        fn config(&self) -> TraceConfig {
            TraceConfig::empty()
        }
        fn trace_event(&mut self, _: &Event) {
            self.0 += 1;
        }
    }

    #[test]
    fn replay_skips_disabled_tracers() {
        let mut tracer = Disabled(0);
        replay(&mut tracer, &region_trace());
        assert_eq!(tracer.0, 0);
    }
}
