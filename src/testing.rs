//! Builders shared by the unit tests.

use crate::ast::{ASSIGN_OP, EQ_OP, Expr, Head, Ref, Rule, Term};
use crate::event::{Event, Locals, Node, Op};

pub fn r(text: &str) -> Ref {
    text.parse().unwrap()
}

/// Reference term from text.
pub fn rt(text: &str) -> Term {
    Term::Ref(r(text))
}

pub fn v(name: &str) -> Term {
    Term::var(name)
}

pub fn locals<'a, I: IntoIterator<Item = (&'a str, Term)>>(bindings: I) -> Locals {
    bindings.into_iter().collect()
}

pub fn assign(lhs: Term, rhs: Term) -> Expr {
    call!(ASSIGN_OP; lhs, rhs)
}

pub fn eq(lhs: Term, rhs: Term) -> Expr {
    call!(EQ_OP; lhs, rhs)
}

pub fn eval(query_id: u64, parent_id: u64, expr: Expr, locals: Locals) -> Event {
    Event::new(Op::Eval, query_id, parent_id, Node::Expr(expr)).with_locals(locals)
}

pub fn enter(query_id: u64, parent_id: u64) -> Event {
    Event::new(Op::Enter, query_id, parent_id, Node::None)
}

pub fn enter_rule(query_id: u64, parent_id: u64, name: &str, value: Term) -> Event {
    let rule = Rule { head: Head::valued(name, value), body: Vec::new() };
    Event::new(Op::Enter, query_id, parent_id, Node::Rule(rule))
}

pub fn exit(query_id: u64, parent_id: u64) -> Event {
    Event::new(Op::Exit, query_id, parent_id, Node::None)
}

pub fn fail(query_id: u64, parent_id: u64) -> Event {
    Event::new(Op::Fail, query_id, parent_id, Node::None)
}
