//! Policy syntax consumed from the evaluation engine.
//!
//! These types mirror the engine's JSON AST closely enough to deserialize a
//! recorded trace (`{"type": "var", "value": "x"}` terms, call expressions as
//! term arrays). The tracer only ever reads them.
//!
//! ## References
//!
//! A [`Ref`] is an ordered path of [`Term`] segments. Segment 0 is the head,
//! normally a variable; the remaining segments address into the head's value:
//!
//! ```text
//! input.servers[i]["name"]
//! ──┬── ───┬─── ┬  ──┬──
//!   │      │    │    └ Term::String("name")
//!   │      │    └ Term::Var("i")       (resolved lazily from locals)
//!   │      └ Term::String("servers")
//!   └ Term::Var("input")               (root-document sentinel)
//! ```

#[path = "ast/parse.rs"]
mod parse;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The reference denoting the whole input document.
pub static INPUT_ROOT_REF: Lazy<Ref> = Lazy::new(|| Ref::new(vec![Term::Var(Var::input())]));

/// Unification (`=`), and the form the compiler rewrites `:=` into.
pub static EQ_OP: Lazy<Ref> = Lazy::new(|| Ref::new(vec![Term::var("eq")]));
/// Declared assignment (`:=`) when the compiler keeps it distinct.
pub static ASSIGN_OP: Lazy<Ref> = Lazy::new(|| Ref::new(vec![Term::var("assign")]));
/// Comparison (`==`). Never binds a variable.
pub static EQUAL_OP: Lazy<Ref> = Lazy::new(|| Ref::new(vec![Term::var("equal")]));
/// `object.get(obj, key, default)`.
pub static OBJECT_GET_OP: Lazy<Ref> = Lazy::new(|| Ref::new(vec![Term::var("object"), Term::string("get")]));

const INPUT: &str = "input";

// --- Var ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Var(String);

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Var(name.into())
    }

    /// The reserved variable bound to the input document.
    pub fn input() -> Self {
        Var(INPUT.to_string())
    }

    pub fn is_input(&self) -> bool {
        self.0 == INPUT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Var {
    fn from(name: &str) -> Self {
        Var::new(name)
    }
}

impl From<String> for Var {
    fn from(name: String) -> Self {
        Var(name)
    }
}

// --- Term --------------------------------------------------------------------

/// A value in the policy syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Term {
    Null,
    Boolean(bool),
    Number(serde_json::Number),
    String(String),
    Var(Var),
    Ref(Ref),
    Array(Vec<Term>),
    Set(Vec<Term>),
    /// Key/value pairs in source order.
    Object(Vec<(Term, Term)>),
    /// Operator reference followed by the arguments.
    Call(Vec<Term>),
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(Var::new(name))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Term::String(s.into())
    }

    pub fn number(n: i64) -> Self {
        Term::Number(n.into())
    }

    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Term::Var(var) => Some(var),
            _ => None,
        }
    }

    /// String and number literals: the only values that can name a document
    /// location.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Term::String(_) | Term::Number(_))
    }

    /// Text of a string or number literal (strings unquoted).
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Term::String(s) => Some(s.clone()),
            Term::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl From<Ref> for Term {
    fn from(reference: Ref) -> Self {
        Term::Ref(reference)
    }
}

impl From<Var> for Term {
    fn from(var: Var) -> Self {
        Term::Var(var)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Null => f.write_str("null"),
            Term::Boolean(b) => write!(f, "{b}"),
            Term::Number(n) => write!(f, "{n}"),
            Term::String(s) => write!(f, "{s:?}"),
            Term::Var(var) => write!(f, "{var}"),
            Term::Ref(reference) => write!(f, "{reference}"),
            Term::Array(items) => write!(f, "[{}]", join(items)),
            Term::Set(items) => write!(f, "{{{}}}", join(items)),
            Term::Object(pairs) => {
                let pairs: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Term::Call(terms) => match terms.split_first() {
                Some((op, args)) => write!(f, "{op}({})", join(args)),
                None => f.write_str("<call>"),
            },
        }
    }
}

fn join(terms: &[Term]) -> String {
    terms.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
}

// --- Ref ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ref(Vec<Term>);

impl Ref {
    pub fn new(segments: Vec<Term>) -> Self {
        Ref(segments)
    }

    pub fn empty() -> Self {
        Ref(Vec::new())
    }

    pub fn segments(&self) -> &[Term] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn head(&self) -> Option<&Term> {
        self.0.first()
    }

    /// Everything after the head; empty for an empty or head-only reference.
    pub fn tail(&self) -> &[Term] {
        self.0.get(1..).unwrap_or(&[])
    }

    /// True when the head is the root-document sentinel.
    pub fn is_input_rooted(&self) -> bool {
        matches!(self.head(), Some(Term::Var(var)) if var.is_input())
    }

    /// A new reference with `suffix` appended.
    pub fn concat(&self, suffix: &[Term]) -> Ref {
        let mut segments = Vec::with_capacity(self.0.len() + suffix.len());
        segments.extend_from_slice(&self.0);
        segments.extend_from_slice(suffix);
        Ref(segments)
    }

    /// Variables in the reference other than the root sentinel.
    pub fn free_vars(&self) -> impl Iterator<Item = &Var> {
        self.0.iter().filter_map(|t| match t {
            Term::Var(var) if !var.is_input() => Some(var),
            _ => None,
        })
    }
}

impl From<Vec<Term>> for Ref {
    fn from(segments: Vec<Term>) -> Self {
        Ref(segments)
    }
}

impl From<&[Term]> for Ref {
    fn from(segments: &[Term]) -> Self {
        Ref(segments.to_vec())
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some((head, rest)) = self.0.split_first() else {
            return Ok(());
        };
        write!(f, "{head}")?;
        for segment in rest {
            match segment {
                Term::String(s) if parse::is_identifier(s) => write!(f, ".{s}")?,
                other => write!(f, "[{other}]")?,
            }
        }
        Ok(())
    }
}

// --- Expressions and rules ---------------------------------------------------

/// `with <target> as <value>`: a local override scoped to one expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct With {
    pub target: Term,
    pub value: Term,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExprTerms {
    /// `[operator, operand...]`
    Call(Vec<Term>),
    Term(Box<Term>),
}

/// One expression of a rule body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(default)]
    pub index: usize,
    pub terms: ExprTerms,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub with: Vec<With>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub negated: bool,
}

impl Expr {
    pub fn call(operator: Ref, operands: Vec<Term>) -> Self {
        let mut terms = Vec::with_capacity(operands.len() + 1);
        terms.push(Term::Ref(operator));
        terms.extend(operands);
        Expr { index: 0, terms: ExprTerms::Call(terms), with: Vec::new(), negated: false }
    }

    pub fn term(term: Term) -> Self {
        Expr { index: 0, terms: ExprTerms::Term(Box::new(term)), with: Vec::new(), negated: false }
    }

    /// Attach a `with target as value` clause.
    pub fn with_override(mut self, target: Term, value: Term) -> Self {
        self.with.push(With { target, value });
        self
    }

    /// Operator of a call expression.
    pub fn operator(&self) -> Option<&Ref> {
        match &self.terms {
            ExprTerms::Call(terms) => match terms.first() {
                Some(Term::Ref(op)) => Some(op),
                _ => None,
            },
            ExprTerms::Term(_) => None,
        }
    }

    /// Call arguments, or the single term of a non-call expression.
    pub fn operands(&self) -> &[Term] {
        match &self.terms {
            ExprTerms::Call(terms) => terms.get(1..).unwrap_or(&[]),
            ExprTerms::Term(term) => std::slice::from_ref(term.as_ref()),
        }
    }

}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("not ")?;
        }
        match &self.terms {
            ExprTerms::Call(terms) => write!(f, "{}", Term::Call(terms.clone()))?,
            ExprTerms::Term(term) => write!(f, "{term}")?,
        }
        for w in &self.with {
            write!(f, " with {} as {}", w.target, w.value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Head {
    pub name: Var,
    #[serde(default)]
    pub key: Option<Term>,
    #[serde(default)]
    pub value: Option<Term>,
}

impl Head {
    /// Head whose value is the given term (`name = value { ... }`).
    pub fn valued(name: impl Into<Var>, value: Term) -> Self {
        Head { name: name.into(), key: None, value: Some(value) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub head: Head,
    #[serde(default)]
    pub body: Vec<Expr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(text: &str) -> Ref {
        text.parse().unwrap()
    }

    #[test]
    fn tail_of_head_only_ref_is_empty() {
        assert!(INPUT_ROOT_REF.tail().is_empty());
        assert!(Ref::empty().tail().is_empty());
        assert_eq!(r("x.y.z").tail(), &[Term::string("y"), Term::string("z")]);
    }

    #[test]
    fn display_uses_brackets_for_non_identifiers() {
        assert_eq!(r(r#"input.a[0]["b c"][i]"#).to_string(), r#"input.a[0]["b c"][i]"#);
    }

    #[test]
    fn call_operands_skip_the_operator() {
        let expr = Expr::call(EQ_OP.clone(), vec![Term::var("x"), Term::Ref(r("input.a"))]);
        assert_eq!(expr.operator(), Some(&*EQ_OP));
        assert_eq!(expr.operands().len(), 2);
        assert_eq!(expr.to_string(), "eq(x, input.a)");
    }

    #[test]
    fn bare_term_expression_is_its_own_operand() {
        let expr = Expr::term(Term::Ref(r("input.enabled")));
        assert_eq!(expr.operator(), None);
        assert_eq!(expr.operands(), &[Term::Ref(r("input.enabled"))]);
    }

    #[test]
    fn free_vars_skip_the_root_sentinel() {
        let reference = r("input.a[i][j]");
        let vars: Vec<&str> = reference.free_vars().map(Var::as_str).collect();
        assert_eq!(vars, vec!["i", "j"]);
    }

    #[test]
    fn deserializes_engine_json_shape() {
        let json = r#"{
            "index": 3,
            "terms": [
                {"type": "ref", "value": [{"type": "var", "value": "eq"}]},
                {"type": "var", "value": "x"},
                {"type": "ref", "value": [
                    {"type": "var", "value": "input"},
                    {"type": "string", "value": "a"},
                    {"type": "number", "value": 2}
                ]}
            ],
            "with": [{"target": {"type": "ref", "value": [{"type": "var", "value": "input"}]},
                      "value": {"type": "var", "value": "y"}}]
        }"#;
        let expr: Expr = serde_json::from_str(json).unwrap();
        assert_eq!(expr.index, 3);
        assert_eq!(expr.operator(), Some(&*EQ_OP));
        assert_eq!(expr.operands()[1], Term::Ref(r("input.a[2]")));
        assert_eq!(expr.with[0].target, Term::Ref(INPUT_ROOT_REF.clone()));
    }
}
