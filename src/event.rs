//! The engine-facing trace contract.
//!
//! The evaluation engine calls [`QueryTracer::trace_event`] once per step of
//! its depth-first walk over the call tree. Each [`Event`] names the query
//! (frame) it belongs to and that query's parent; the tracer rebuilds nesting
//! from those two ids alone.

use crate::ast::{Expr, Rule, Term, Var};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trace operation kinds. Only `Enter`, `Exit`, `Fail`, `Eval` and `Index`
/// carry information the tracer uses; the rest only move the frame stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    Enter,
    Exit,
    Eval,
    Redo,
    Save,
    Fail,
    Duplicate,
    Note,
    Index,
    Wasm,
    Unify,
    #[serde(other)]
    Other,
}

/// The syntax node an event refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    Rule(Rule),
    Expr(Expr),
    Body(Vec<Expr>),
    #[default]
    None,
}

/// Snapshot of bound local variables, plugged by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locals(BTreeMap<Var, Term>);

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &Var) -> Option<&Term> {
        self.0.get(var)
    }

    pub fn insert(&mut self, var: impl Into<Var>, value: Term) {
        self.0.insert(var.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<Var>> FromIterator<(K, Term)> for Locals {
    fn from_iter<I: IntoIterator<Item = (K, Term)>>(iter: I) -> Self {
        Locals(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub op: Op,
    pub query_id: u64,
    #[serde(default)]
    pub parent_id: u64,
    #[serde(default)]
    pub node: Node,
    #[serde(default)]
    pub locals: Locals,
    #[serde(default)]
    pub location: Option<Location>,
}

impl Event {
    pub fn new(op: Op, query_id: u64, parent_id: u64, node: Node) -> Self {
        Event { op, query_id, parent_id, node, locals: Locals::new(), location: None }
    }

    pub fn with_locals(mut self, locals: Locals) -> Self {
        self.locals = locals;
        self
    }

    pub fn at(mut self, file: impl Into<String>, row: usize) -> Self {
        self.location = Some(Location { file: file.into(), row });
        self
    }
}

bitflags::bitflags! {
    /// What a tracer asks of the engine before events are delivered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TraceConfig: u8 {
        /// Resolve local variables to their values in [`Event::locals`].
        const PLUG_LOCAL_VARS = 1 << 0;
    }
}

/// A consumer of the engine's trace stream.
///
/// Called synchronously, one event at a time, in traversal order.
pub trait QueryTracer {
    fn enabled(&self) -> bool;
    fn config(&self) -> TraceConfig;
    fn trace_event(&mut self, event: &Event);
}
