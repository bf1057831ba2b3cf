//! Textual references.
//!
//! Parses the compact form used in reports and tests:
//!
//! ```text
//! input.a[0]["b c"][i]
//! │     │ │   │     └ [ident]       -> Term::Var
//! │     │ │   └ ["..."]             -> Term::String (JSON escapes)
//! │     │ └ [number]                -> Term::Number
//! │     └ .ident                    -> Term::String
//! └ ident                           -> Term::Var (head)
//! ```

use super::{Ref, Term, Var};
use crate::{Error, Result};
use std::str::FromStr;

impl Ref {
    /// Parse a reference from its textual form.
    pub fn parse(text: &str) -> Result<Ref> {
        let text = text.trim();
        let Some(head) = regex!(r"^[A-Za-z_][A-Za-z0-9_]*").find(text) else {
            return Err(invalid(text, "expected a variable at the head"));
        };

        let mut segments = vec![Term::Var(Var::new(head.as_str()))];
        let mut rest = &text[head.end()..];
        let segment = regex!(
            r#"^(?:\.([A-Za-z_][A-Za-z0-9_]*)|\[(-?[0-9]+(?:\.[0-9]+)?)\]|\[("(?:[^"\\]|\\.)*")\]|\[([A-Za-z_][A-Za-z0-9_]*)\])"#
        );

        while !rest.is_empty() {
            let Some(caps) = segment.captures(rest) else {
                return Err(invalid(text, format!("unexpected `{rest}`")));
            };
            let term = if let Some(field) = caps.get(1) {
                Term::String(field.as_str().to_string())
            } else if let Some(number) = caps.get(2) {
                let number = number.as_str().parse::<serde_json::Number>().map_err(|e| invalid(text, e.to_string()))?;
                Term::Number(number)
            } else if let Some(quoted) = caps.get(3) {
                let s = serde_json::from_str::<String>(quoted.as_str()).map_err(|e| invalid(text, e.to_string()))?;
                Term::String(s)
            } else if let Some(var) = caps.get(4) {
                Term::Var(Var::new(var.as_str()))
            } else {
                return Err(invalid(text, format!("unexpected `{rest}`")));
            };
            segments.push(term);
            rest = &rest[caps.get(0).map_or(rest.len(), |m| m.end())..];
        }

        Ok(Ref::new(segments))
    }
}

impl FromStr for Ref {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ref::parse(s)
    }
}

pub(super) fn is_identifier(s: &str) -> bool {
    regex!(r"^[A-Za-z_][A-Za-z0-9_]*$").is_match(s)
}

fn invalid(text: &str, reason: impl Into<String>) -> Error {
    Error::InvalidRef { text: text.to_string(), reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_segment_kind() {
        let parsed = Ref::parse(r#"input.a[0]["b.c"][i][-1.5]"#).unwrap();
        assert_eq!(
            parsed.segments(),
            &[
                Term::var("input"),
                Term::string("a"),
                Term::number(0),
                Term::string("b.c"),
                Term::var("i"),
                Term::Number(serde_json::Number::from_f64(-1.5).unwrap()),
            ]
        );
    }

    #[test]
    fn quoted_segments_unescape() {
        let parsed: Ref = r#"x["say \"hi\""]"#.parse().unwrap();
        assert_eq!(parsed.tail(), &[Term::string(r#"say "hi""#)]);
    }

    #[test]
    fn head_only() {
        assert_eq!(Ref::parse("input").unwrap().segments(), &[Term::var("input")]);
    }

    #[test]
    fn rejects_malformed_text() {
        for bad in ["", ".a", "input..a", "input[", "input.a[]", "0.a", "input.a b"] {
            let err = Ref::parse(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidRef { .. }), "{bad}: {err}");
        }
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("servers"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("b c"));
        assert!(!is_identifier("1a"));
        assert!(!is_identifier(""));
    }
}
