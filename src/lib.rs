//! Input-access provenance for rule-based policy evaluation.
//!
//! A policy engine walks the call tree of a program and reports what it does
//! as a flat stream of trace [`Event`]s. [`InputTracer`] consumes that stream,
//! rebuilds the call nesting as a stack of frames, follows how variables alias
//! pieces of the `input` document, and collects the concrete document paths
//! that were read on derivations that succeeded.
//!
//! ```
//! use reftrace::{analyze, call, Event, Expr, Locals, Node, Op, Ref, Term};
//! use reftrace::ast::{ASSIGN_OP, EQUAL_OP};
//!
//! let region: Ref = "input.region".parse().unwrap();
//! let events = vec![
//!     Event::new(Op::Enter, 1, 0, Node::None),
//!     Event::new(Op::Eval, 1, 0, Node::Expr(call!(ASSIGN_OP; Term::var("r"), Term::Ref(region)))),
//!     Event::new(Op::Eval, 1, 0, Node::Expr(call!(EQUAL_OP; Term::var("r"), Term::string("us-east-1"))))
//!         .with_locals(Locals::from_iter([("r", Term::string("us-east-1"))])),
//! ];
//!
//! let analysis = analyze(&events);
//! assert!(analysis.accesses.contains("input.region"));
//! ```

extern crate self as reftrace;

#[macro_use]
mod macros;
mod api;
pub mod ast;
mod error;
pub mod event;
mod tracer;

#[cfg(test)]
mod testing;

pub use api::{
    Analysis, AnalysisDetails, AnalysisVerbose, Breakpoint, Options, analyze, analyze_verbose_with, analyze_with,
    read_events, replay,
};
pub use ast::{Expr, Head, Ref, Rule, Term, Var, With};
pub use error::{Error, Result};
pub use event::{Event, Locals, Location, Node, Op, QueryTracer, TraceConfig};
pub use tracer::{
    Frame, FrameSummary, InputRef, InputTracer, ProvenanceMap, RuleReturn, TraceMetrics, Unresolved, is_ancestor,
    render, substitute_locals,
};
