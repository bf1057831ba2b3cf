//! Turning references into concrete document paths.
//!
//! Provenance is stored symbolically: a location may still contain variable
//! segments (`input.servers[i]`) whose values arrive later in the event
//! stream. Rendering resolves those against the locals of the event being
//! handled. Anything that cannot be resolved to a literal makes the whole
//! reference [`Unresolved`]; callers drop it rather than emit a partial path.

use crate::ast::{Ref, Term, Var};
use crate::event::Locals;
use std::fmt;

pub const SEPARATOR: &str = ".";

/// Why a reference could not be turned into a concrete path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// The variable has no value in the current locals.
    Unbound(Var),
    /// The variable is bound, but not to a string or number.
    NotScalar(Var),
    /// A segment that is neither a literal nor a variable.
    Segment(Term),
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unresolved::Unbound(var) => write!(f, "no value for `{var}`"),
            Unresolved::NotScalar(var) => write!(f, "`{var}` is not bound to a string or number"),
            Unresolved::Segment(term) => write!(f, "unsupported segment `{term}`"),
        }
    }
}

/// True when `ancestor` is an exact leading run of `path`.
pub fn is_ancestor(ancestor: &[Term], path: &[Term]) -> bool {
    path.starts_with(ancestor)
}

/// Render `reference` as a dotted path.
///
/// ```text
/// input.servers[i].name   with i = 2   ->  "input.servers.2.name"
/// input.servers[i].name   with i unset ->  Unresolved::Unbound(i)
/// ```
pub fn render(reference: &Ref, locals: &Locals) -> Result<String, Unresolved> {
    let mut rendered = Vec::with_capacity(reference.len());
    for segment in reference.segments() {
        match segment {
            Term::Var(var) if var.is_input() => rendered.push(var.to_string()),
            Term::Var(var) => match locals.get(var) {
                Some(value) => match value.scalar_text() {
                    Some(text) => rendered.push(text),
                    None => return Err(Unresolved::NotScalar(var.clone())),
                },
                None => return Err(Unresolved::Unbound(var.clone())),
            },
            literal => match literal.scalar_text() {
                Some(text) => rendered.push(text),
                None => return Err(Unresolved::Segment(literal.clone())),
            },
        }
    }
    Ok(rendered.join(SEPARATOR))
}

/// Replace variable segments bound to literals with those literals.
///
/// Unbound variables, and variables bound to composite values, stay in place
/// so they can still resolve later. Only a segment that is neither a literal
/// nor a variable fails.
pub fn substitute_locals(reference: &Ref, locals: &Locals) -> Result<Ref, Unresolved> {
    let mut substituted = Vec::with_capacity(reference.len());
    for segment in reference.segments() {
        match segment {
            Term::Var(var) if var.is_input() => substituted.push(segment.clone()),
            Term::Var(var) => match locals.get(var) {
                Some(value) if value.is_scalar() => substituted.push(value.clone()),
                _ => substituted.push(segment.clone()),
            },
            literal if literal.is_scalar() => substituted.push(literal.clone()),
            other => return Err(Unresolved::Segment(other.clone())),
        }
    }
    Ok(Ref::new(substituted))
}
