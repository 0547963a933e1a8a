//! The live conversation scope.
//!
//! The stack holds the chain of rules the conversation is currently "inside",
//! outermost first. Only the innermost rule's children get first refusal on the
//! next input.
//!
//! ```text
//! [ u:(hello) , u1:(my name is _) ]     depth 2, innermost = u1
//!
//! scoped match of a u2 child  -> truncate to 2, push  -> depth 3
//! top-level match             -> replace with [rule]  -> depth 1
//! ```
//!
//! Frames are `Arc<Rule>` handles into the immutable rule tree; no frame points
//! back at its parent.

use crate::Rule;
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
pub struct ScopeStack {
    frames: Vec<Arc<Rule>>,
}

impl ScopeStack {
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn innermost(&self) -> Option<&Arc<Rule>> {
        self.frames.last()
    }

    /// Active rules, outermost first.
    pub fn frames(&self) -> &[Arc<Rule>] {
        &self.frames
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Enter a rule matched among the innermost scope's children.
    ///
    /// Anything at or below the rule's level is discarded first, so matching a
    /// level-`L` rule always leaves exactly `L + 1` frames.
    pub fn enter_scoped(&mut self, rule: Arc<Rule>) {
        self.frames.truncate(rule.level);
        self.frames.push(rule);
    }

    /// Enter a rule matched at top level; the previous context is dropped.
    pub fn enter_top_level(&mut self, rule: Arc<Rule>) {
        self.frames.clear();
        self.frames.push(rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(level: usize, order: usize) -> Arc<Rule> {
        Arc::new(Rule {
            level,
            pattern: format!("p{order}"),
            output: format!("o{order}"),
            line: order + 1,
            order,
            children: Vec::new(),
        })
    }

    #[test]
    fn scoped_entry_truncates_to_rule_level() {
        let mut stack = ScopeStack::default();
        stack.enter_top_level(rule(0, 0));
        stack.enter_scoped(rule(1, 1));
        stack.enter_scoped(rule(2, 2));
        assert_eq!(stack.depth(), 3);

        stack.enter_scoped(rule(1, 3));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.innermost().unwrap().order, 3);
        assert_eq!(stack.frames()[0].order, 0);
    }

    #[test]
    fn top_level_entry_replaces_everything() {
        let mut stack = ScopeStack::default();
        stack.enter_top_level(rule(0, 0));
        stack.enter_scoped(rule(1, 1));
        stack.enter_top_level(rule(0, 2));
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.innermost().unwrap().order, 2);

        stack.clear();
        assert!(stack.is_empty());
        assert!(stack.innermost().is_none());
    }
}
