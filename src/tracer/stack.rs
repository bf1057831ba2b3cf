//! The chain of active frames.
//!
//! Events carry only `query_id` / `parent_id`, so nesting is rebuilt from
//! them. The stack always holds one path of the call tree, root first:
//!
//! ```text
//! event (q=7, p=3)          stack: [1, 3, 5, 6]
//!   rposition(id == 7 || id == 3)  -> index 1
//!   pop 6 into 5, pop 5 into 3     -> [1, 3]
//!   top is 3, not 7                -> push child 7 -> [1, 3, 7]
//! ```
//!
//! Popping merges a frame upward: its accesses go to the parent unless it
//! failed, and its return provenance (if any) is handed up either way.

use super::frame::Frame;
use crate::event::Event;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn root(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn push(&mut self, frame: Frame) {
        debug!(query_id = frame.id, parent_id = frame.parent_id, depth = self.frames.len() + 1, "push frame");
        self.frames.push(frame);
    }

    /// Index of the innermost frame the event belongs to, either as its own
    /// frame or as the parent of a new one.
    pub fn position_for(&self, event: &Event) -> Option<usize> {
        self.frames.iter().rposition(|frame| frame.id == event.query_id || frame.id == event.parent_id)
    }

    /// Pop the top frame and merge it into the one below. The root is never
    /// popped; `None` when only the root (or nothing) is left.
    pub fn pop_merge(&mut self) -> Option<Frame> {
        if self.frames.len() < 2 {
            return None;
        }
        let child = self.frames.pop()?;
        let parent = self.frames.last_mut()?;

        if child.failed {
            debug!(query_id = child.id, dropped = child.accesses.len(), "discarding accesses of failed frame");
        } else {
            parent.merge_accesses(&child);
        }
        if let Some(ret) = child.rule_return() {
            parent.returns.push(ret);
        }
        debug!(query_id = child.id, into = parent.id, "pop frame");
        Some(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{enter, r};
    use crate::tracer::provenance::InputRef;
    use crate::{Term, Var};

    fn stack_of(ids: &[(u64, u64)]) -> FrameStack {
        let mut stack = FrameStack::new();
        for &(id, parent) in ids {
            stack.push(Frame::root(id, parent));
        }
        stack
    }

    #[test]
    fn position_prefers_the_innermost_match() {
        let stack = stack_of(&[(1, 0), (3, 1), (5, 3)]);
        assert_eq!(stack.position_for(&enter(5, 3)), Some(2));
        assert_eq!(stack.position_for(&enter(7, 3)), Some(1));
        assert_eq!(stack.position_for(&enter(8, 5)), Some(2));
        assert_eq!(stack.position_for(&enter(9, 42)), None);
    }

    #[test]
    fn root_is_never_popped() {
        let mut stack = stack_of(&[(1, 0)]);
        assert!(stack.pop_merge().is_none());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn pop_merges_successful_accesses() {
        let mut stack = stack_of(&[(1, 0), (2, 1)]);
        stack.top_mut().unwrap().accesses.insert("input.a".to_string());

        let popped = stack.pop_merge().unwrap();
        assert_eq!(popped.id(), 2);
        assert!(stack.top().unwrap().accesses().contains("input.a"));
    }

    #[test]
    fn pop_discards_failed_accesses_but_keeps_returns() {
        let mut stack = stack_of(&[(1, 0), (2, 1)]);
        {
            let child = stack.top_mut().unwrap();
            child.accesses.insert("input.a".to_string());
            child.failed = true;
            child.head = Some(crate::Head::valued("region", Term::var("x")));
            child.return_refs = Some(vec![InputRef::new(crate::Ref::empty(), vec![r("input.region")])]);
        }

        stack.pop_merge().unwrap();
        let root = stack.top().unwrap();
        assert!(root.accesses().is_empty());
        assert_eq!(root.returns().len(), 1);
        assert_eq!(root.returns()[0].rule, Var::new("region"));
    }
}
