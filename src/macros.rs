#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Build a call expression from an operator reference and operand terms.
///
/// ```
/// use reftrace::{call, Term};
/// use reftrace::ast::EQ_OP;
///
/// let expr = call!(EQ_OP; Term::var("x"), Term::string("y"));
/// assert_eq!(expr.operands().len(), 2);
/// ```
#[macro_export]
macro_rules! call {
    ($op:expr; $($operand:expr),* $(,)?) => {
        $crate::ast::Expr::call((*$op).clone(), vec![ $($operand),* ])
    };
}
