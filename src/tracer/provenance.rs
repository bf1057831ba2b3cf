//! Per-frame variable provenance.
//!
//! Every tracked variable maps to an ordered list of [`InputRef`] records. A
//! record says "the part of this variable at `location_in_var` came from any
//! of `locations_in_input`". Several records per variable are normal: a value
//! proven equal to input through more than one disjunct, or an object whose
//! fields were assembled from different input fragments.
//!
//! ```text
//! o := {"a": input.x, "b": input.y}
//!
//! o ─┬─ [a] -> [input.x]
//!    └─ [b] -> [input.y]
//!
//! expand(o, [a, z])  ->  [input.x.z]
//! expand(o, [k])     ->  [input.y]   (k = "b" in locals)
//! expand(o, [])      ->  []          (no record covers the whole of o)
//! ```

use super::render::{self, render, substitute_locals};
use crate::ast::{INPUT_ROOT_REF, Ref, Term, Var};
use crate::event::Locals;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, trace};

/// One provenance record of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRef {
    /// Path relative to the variable's own value.
    pub location_in_var: Ref,
    /// Alternative document locations that path corresponds to.
    pub locations_in_input: Vec<Ref>,
}

impl InputRef {
    pub fn new(location_in_var: Ref, locations_in_input: Vec<Ref>) -> Self {
        InputRef { location_in_var, locations_in_input }
    }

    /// The whole variable is the whole input document.
    pub fn root() -> Self {
        InputRef::new(Ref::empty(), vec![INPUT_ROOT_REF.clone()])
    }

    /// True when this record covers an access to `path` within the variable.
    pub fn is_parent(&self, path: &[Term]) -> bool {
        render::is_ancestor(self.location_in_var.segments(), path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProvenanceMap {
    vars: HashMap<Var, Vec<InputRef>>,
}

impl ProvenanceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map tracking only `input`, with the given records.
    pub fn seeded(input: Vec<InputRef>) -> Self {
        let mut map = Self::new();
        if !input.is_empty() {
            map.vars.insert(Var::input(), input);
        }
        map
    }

    pub fn contains(&self, var: &Var) -> bool {
        self.vars.contains_key(var)
    }

    pub fn get(&self, var: &Var) -> Option<&[InputRef]> {
        self.vars.get(var).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Record that `var` at `location_in_var` equals `head.tail`.
    ///
    /// The source is expanded against this map first; if that yields nothing
    /// (`head` untracked, or no record of `head` covers `tail`) the call is a
    /// no-op. Returns whether a new record was stored.
    pub fn add_record(&mut self, var: &Var, location_in_var: Ref, head: &Var, tail: &[Term], locals: &Locals) -> bool {
        let expanded = self.expand(head, tail, locals);
        if expanded.is_empty() {
            return false;
        }

        let record = InputRef::new(location_in_var, expanded);
        let records = self.vars.entry(var.clone()).or_default();
        if records.contains(&record) {
            return false;
        }
        debug!(
            var = %var,
            location = %record.location_in_var,
            sources = record.locations_in_input.len(),
            "tracking provenance"
        );
        records.push(record);
        true
    }

    /// Every document location `head.tail` may alias, in record order.
    ///
    /// Records for a sub-structure are keyed by literals, so they are matched
    /// against `tail` with scalar-bound variables replaced from `locals`. An
    /// unbound variable stays symbolic and matches no literal key.
    pub fn expand(&self, head: &Var, tail: &[Term], locals: &Locals) -> Vec<Ref> {
        let Some(records) = self.vars.get(head) else {
            return Vec::new();
        };
        let raw = Ref::from(tail);
        let resolved = substitute_locals(&raw, locals).unwrap_or(raw);

        let mut expanded = Vec::new();
        for record in records {
            let path = if record.location_in_var.is_empty() { tail } else { resolved.segments() };
            if !record.is_parent(path) {
                continue;
            }
            let accessor = &path[record.location_in_var.len()..];
            expanded.extend(record.locations_in_input.iter().map(|location| location.concat(accessor)));
        }
        expanded
    }

    /// Concrete paths read by accessing `head.tail` under `locals`.
    pub fn render_access(&self, head: &Var, tail: &[Term], locals: &Locals) -> BTreeSet<String> {
        self.expand(head, tail, locals)
            .iter()
            .filter_map(|location| match render(location, locals) {
                Ok(path) => {
                    trace!(%path, "input access");
                    Some(path)
                }
                Err(reason) => {
                    trace!(%location, %reason, "dropping unresolved access");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{locals, r};

    fn root_map() -> ProvenanceMap {
        ProvenanceMap::seeded(vec![InputRef::root()])
    }

    #[test]
    fn root_seeding_expands_to_the_document_root() {
        let map = root_map();
        assert_eq!(map.expand(&Var::input(), &[], &Locals::new()), vec![INPUT_ROOT_REF.clone()]);
    }

    #[test]
    fn empty_seed_tracks_nothing() {
        assert!(!ProvenanceMap::seeded(Vec::new()).contains(&Var::input()));
    }

    #[test]
    fn prefix_propagation() {
        let mut map = root_map();
        assert!(map.add_record(&Var::new("x"), Ref::empty(), &Var::input(), r("input.a").tail(), &Locals::new()));
        assert_eq!(map.expand(&Var::new("x"), r("x.b").tail(), &Locals::new()), vec![r("input.a.b")]);
    }

    #[test]
    fn fan_out_keeps_record_order() {
        let mut map = root_map();
        let x = Var::new("x");
        map.add_record(&x, Ref::empty(), &Var::input(), r("input.a").tail(), &Locals::new());
        map.add_record(&x, Ref::empty(), &Var::input(), r("input.c").tail(), &Locals::new());
        assert_eq!(map.expand(&x, r("x.b").tail(), &Locals::new()), vec![r("input.a.b"), r("input.c.b")]);
    }

    #[test]
    fn sub_structure_records_only_cover_their_own_paths() {
        let mut map = root_map();
        let o = Var::new("o");
        map.add_record(&o, r("o.a").tail().into(), &Var::input(), r("input.x").tail(), &Locals::new());
        map.add_record(&o, r("o.b").tail().into(), &Var::input(), r("input.y").tail(), &Locals::new());

        assert_eq!(map.expand(&o, r("o.a.z").tail(), &Locals::new()), vec![r("input.x.z")]);
        assert_eq!(map.expand(&o, r("o.b").tail(), &Locals::new()), vec![r("input.y")]);
        assert!(map.expand(&o, &[], &Locals::new()).is_empty());
    }

    #[test]
    fn sub_structure_keys_resolve_through_locals() {
        let mut map = root_map();
        let o = Var::new("o");
        map.add_record(&o, r("o.a").tail().into(), &Var::input(), r("input.x").tail(), &Locals::new());
        map.add_record(&o, r("o[1]").tail().into(), &Var::input(), r("input.y").tail(), &Locals::new());

        let bound = locals([("k", Term::string("a")), ("i", Term::number(1))]);
        assert_eq!(map.expand(&o, r("o[k].z").tail(), &bound), vec![r("input.x.z")]);
        assert_eq!(map.expand(&o, r("o[i]").tail(), &bound), vec![r("input.y")]);
        assert!(map.expand(&o, r("o[k]").tail(), &Locals::new()).is_empty());
    }

    #[test]
    fn untracked_source_is_a_no_op() {
        let mut map = root_map();
        assert!(!map.add_record(&Var::new("x"), Ref::empty(), &Var::new("data"), r("data.a").tail(), &Locals::new()));
        assert!(!map.contains(&Var::new("x")));
    }

    #[test]
    fn repeated_records_are_stored_once() {
        let mut map = root_map();
        let x = Var::new("x");
        assert!(map.add_record(&x, Ref::empty(), &Var::input(), r("input.a").tail(), &Locals::new()));
        assert!(!map.add_record(&x, Ref::empty(), &Var::input(), r("input.a").tail(), &Locals::new()));
        assert_eq!(map.get(&x).map(<[InputRef]>::len), Some(1));
    }

    #[test]
    fn render_access_drops_unresolved_paths() {
        let mut map = root_map();
        let x = Var::new("x");
        map.add_record(&x, Ref::empty(), &Var::input(), r("input.a[i]").tail(), &Locals::new());
        map.add_record(&x, Ref::empty(), &Var::input(), r("input.b").tail(), &Locals::new());

        let rendered = map.render_access(&x, &[], &Locals::new());
        assert_eq!(rendered, BTreeSet::from(["input.b".to_string()]));

        let rendered = map.render_access(&x, &[], &locals([("i", Term::number(1))]));
        assert_eq!(rendered, BTreeSet::from(["input.a.1".to_string(), "input.b".to_string()]));
    }
}
