//! One activation of a rule body.
//!
//! A frame owns the provenance of its variables and the set of input paths
//! read while it (or an already merged descendant) was active. It reacts to
//! five kinds of event:
//!
//! ```text
//! Enter  ──▶ remember the rule head (if the node is a rule)
//! Exit   ──▶ resolve the head variable's provenance as the return value
//! Fail   ──▶ mark failed; accesses will be dropped on merge
//! Eval   ──▶ bind provenance (assignment / object.get) + record accesses
//!            + compute the input a child frame should see
//! Index  ──▶ record accesses + compute the child input
//! ```

use super::metrics::FrameSummary;
use super::provenance::{InputRef, ProvenanceMap};
use super::render::substitute_locals;
use crate::ast::{ASSIGN_OP, EQ_OP, Expr, Head, OBJECT_GET_OP, Ref, Term, Var};
use crate::event::{Event, Locals, Node, Op};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Provenance of a rule's value, handed to the parent when the frame ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReturn {
    pub query_id: u64,
    pub rule: Var,
    pub provenance: Vec<InputRef>,
}

impl RuleReturn {
    /// Every input location the value may come from, rendered for display.
    pub fn locations(&self) -> Vec<String> {
        self.provenance.iter().flat_map(|record| record.locations_in_input.iter().map(Ref::to_string)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub(super) id: u64,
    pub(super) parent_id: u64,
    pub(super) vars: ProvenanceMap,
    pub(super) locals: Locals,
    pub(super) head: Option<Head>,
    /// What a child frame's `input` starts as. `None` means the child sees no
    /// input provenance at all.
    pub(super) next_input: Option<Vec<InputRef>>,
    pub(super) failed: bool,
    pub(super) return_refs: Option<Vec<InputRef>>,
    pub(super) accesses: BTreeSet<String>,
    pub(super) returns: Vec<RuleReturn>,
}

impl Frame {
    /// A frame whose `input` starts with the given provenance.
    pub fn new(id: u64, parent_id: u64, input: Option<Vec<InputRef>>) -> Self {
        let vars = ProvenanceMap::seeded(input.unwrap_or_default());
        let next_input = vars.get(&Var::input()).map(<[InputRef]>::to_vec);
        Frame {
            id,
            parent_id,
            vars,
            locals: Locals::new(),
            head: None,
            next_input,
            failed: false,
            return_refs: None,
            accesses: BTreeSet::new(),
            returns: Vec::new(),
        }
    }

    /// The top-level frame: `input` is the whole document.
    pub fn root(id: u64, parent_id: u64) -> Self {
        Self::new(id, parent_id, Some(vec![InputRef::root()]))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn accesses(&self) -> &BTreeSet<String> {
        &self.accesses
    }

    pub fn provenance(&self) -> &ProvenanceMap {
        &self.vars
    }

    pub fn next_input(&self) -> Option<&[InputRef]> {
        self.next_input.as_deref()
    }

    pub fn return_provenance(&self) -> Option<&[InputRef]> {
        self.return_refs.as_deref()
    }

    /// Return provenance of completed child frames, in completion order.
    pub fn returns(&self) -> &[RuleReturn] {
        &self.returns
    }

    pub fn rule_name(&self) -> Option<&Var> {
        self.head.as_ref().map(|head| &head.name)
    }

    pub fn handle_event(&mut self, event: &Event) {
        self.locals = event.locals.clone();
        match (event.op, &event.node) {
            (Op::Enter, Node::Rule(rule)) => self.head = Some(rule.head.clone()),
            (Op::Exit, _) => self.resolve_return(),
            (Op::Fail, _) => self.failed = true,
            (Op::Eval, Node::Expr(expr)) => {
                self.extract_input_vars(expr);
                self.extract_accesses(expr);
                self.extract_next_input(expr);
            }
            (Op::Index, Node::Expr(expr)) => {
                self.extract_accesses(expr);
                self.extract_next_input(expr);
            }
            _ => {}
        }
    }

    pub fn merge_accesses(&mut self, child: &Frame) {
        self.accesses.extend(child.accesses.iter().cloned());
    }

    pub(super) fn rule_return(&self) -> Option<RuleReturn> {
        let rule = self.rule_name()?.clone();
        let provenance = self.return_refs.clone()?;
        Some(RuleReturn { query_id: self.id, rule, provenance })
    }

    pub fn summary(&self) -> FrameSummary {
        FrameSummary {
            query_id: self.id,
            parent_id: self.parent_id,
            rule: self.rule_name().map(Var::to_string),
            failed: self.failed,
            tracked_vars: self.vars.len(),
            accesses: self.accesses.iter().cloned().collect(),
            returns: self.rule_return().map(|ret| ret.locations()).unwrap_or_default(),
        }
    }

    fn resolve_return(&mut self) {
        let Some(Head { value: Some(Term::Var(ret)), .. }) = &self.head else {
            return;
        };
        // Absent when the head variable was never tracked.
        self.return_refs = self.vars.get(ret).map(<[InputRef]>::to_vec);
    }

    // --- Provenance binding --------------------------------------------------

    fn extract_input_vars(&mut self, expr: &Expr) {
        let Some(operator) = expr.operator() else {
            return;
        };
        if *operator == *EQ_OP || *operator == *ASSIGN_OP {
            self.extract_assignment(expr.operands());
        } else if *operator == *OBJECT_GET_OP {
            self.extract_projection(expr.operands());
        }
    }

    /// `var = ref`, `var = var`, `var = {..}` / `var = [..]`, in either order.
    fn extract_assignment(&mut self, operands: &[Term]) {
        let [lhs, rhs] = operands else {
            return;
        };
        match (lhs, rhs) {
            (Term::Var(var), Term::Ref(source)) | (Term::Ref(source), Term::Var(var)) => {
                self.alias_ref(var, Ref::empty(), source);
            }
            (Term::Var(a), Term::Var(b)) => {
                if self.vars.contains(b) {
                    self.alias_var(a, Ref::empty(), b);
                } else if self.vars.contains(a) {
                    self.alias_var(b, Ref::empty(), a);
                }
            }
            (Term::Var(var), composite @ (Term::Object(_) | Term::Array(_)))
            | (composite @ (Term::Object(_) | Term::Array(_)), Term::Var(var)) => {
                self.alias_members(var, &[], composite);
            }
            _ => {}
        }
    }

    /// `object.get(obj, key, default, out)`: `out` aliases `obj[key]`.
    fn extract_projection(&mut self, operands: &[Term]) {
        let [Term::Var(object), key, _default, Term::Var(out)] = operands else {
            return;
        };
        if !(key.is_scalar() || key.as_var().is_some()) || !self.vars.contains(object) {
            return;
        }
        self.vars.add_record(out, Ref::empty(), object, std::slice::from_ref(key), &self.locals);
    }

    fn alias_ref(&mut self, var: &Var, location: Ref, source: &Ref) {
        let Some(Term::Var(head)) = source.head() else {
            return;
        };
        if self.vars.contains(head) {
            self.vars.add_record(var, location, head, source.tail(), &self.locals);
        }
    }

    fn alias_var(&mut self, var: &Var, location: Ref, source: &Var) {
        if var != source && self.vars.contains(source) {
            self.vars.add_record(var, location, source, &[], &self.locals);
        }
    }

    /// Per-member provenance for a value built as an object or array literal.
    fn alias_members(&mut self, var: &Var, prefix: &[Term], composite: &Term) {
        let members: Vec<(Term, &Term)> = match composite {
            Term::Object(pairs) => pairs.iter().filter(|(k, _)| k.is_scalar()).map(|(k, v)| (k.clone(), v)).collect(),
            Term::Array(items) => items.iter().enumerate().map(|(i, v)| (Term::Number(i.into()), v)).collect(),
            _ => return,
        };
        for (key, value) in members {
            let mut location = prefix.to_vec();
            location.push(key);
            match value {
                Term::Ref(source) => self.alias_ref(var, Ref::new(location), source),
                Term::Var(source) => self.alias_var(var, Ref::new(location), source),
                Term::Object(_) | Term::Array(_) => self.alias_members(var, &location, value),
                _ => {}
            }
        }
    }

    // --- Accesses ------------------------------------------------------------

    fn extract_accesses(&mut self, expr: &Expr) {
        for operand in expr.operands() {
            self.extract_access(operand);
        }
    }

    fn extract_access(&mut self, term: &Term) {
        match term {
            Term::Ref(reference) => {
                if let Some(Term::Var(head)) = reference.head() {
                    if self.vars.contains(head) {
                        let found = self.vars.render_access(head, reference.tail(), &self.locals);
                        self.accesses.extend(found);
                    }
                }
            }
            Term::Var(var) => {
                if self.vars.contains(var) {
                    let found = self.vars.render_access(var, &[], &self.locals);
                    self.accesses.extend(found);
                }
            }
            Term::Array(items) | Term::Set(items) | Term::Call(items) => {
                for item in items {
                    self.extract_access(item);
                }
            }
            Term::Object(pairs) => {
                for (key, value) in pairs {
                    self.extract_access(key);
                    self.extract_access(value);
                }
            }
            Term::Null | Term::Boolean(_) | Term::Number(_) | Term::String(_) => {}
        }
    }

    // --- Child input ---------------------------------------------------------

    /// Decide what `input` a child frame spawned from this expression sees.
    ///
    /// ```text
    /// no `with input ...`           -> this frame's own `input` provenance
    /// with input as v (v tracked)   -> v's provenance, locals substituted
    /// with input as <non-var>       -> none
    /// with input.path as ...        -> none (partial overrides unsupported)
    /// ```
    fn extract_next_input(&mut self, expr: &Expr) {
        let target = expr.with.iter().find_map(|w| match &w.target {
            Term::Ref(target) if target.is_input_rooted() => Some((target, &w.value)),
            _ => None,
        });
        let Some((target, value)) = target else {
            self.next_input = self.vars.get(&Var::input()).map(<[InputRef]>::to_vec);
            return;
        };

        if target.len() > 1 {
            debug!(query_id = self.id, %target, "partial input override; not propagating input provenance");
            self.next_input = None;
            return;
        }
        let Term::Var(source) = value else {
            self.next_input = None;
            return;
        };
        let Some(records) = self.vars.get(source) else {
            self.next_input = None;
            return;
        };

        let mut next = Vec::with_capacity(records.len());
        for record in records {
            let mut locations = Vec::with_capacity(record.locations_in_input.len());
            for location in &record.locations_in_input {
                match substitute_locals(location, &self.locals) {
                    Ok(substituted) => {
                        if let Some(var) = substituted.free_vars().next() {
                            warn!(query_id = self.id, %var, "unresolved variable in with override");
                        }
                        locations.push(substituted);
                    }
                    Err(reason) => {
                        warn!(query_id = self.id, %location, %reason, "stopping with override expansion");
                        self.next_input = None;
                        return;
                    }
                }
            }
            next.push(InputRef::new(record.location_in_var.clone(), locations));
        }
        self.next_input = Some(next);
    }
}
