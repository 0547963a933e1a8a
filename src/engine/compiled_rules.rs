//! Compiled patterns for every rule of a script.
//!
//! Loading a script and compiling its patterns are separate steps: a pattern
//! may reference a definition declared further down the file, so patterns are
//! compiled once the whole script (and its definition table) is known.
//!
//! A pattern that fails to compile is kept as its `PatternError`. The dialogue
//! engine reports it when the rule is tried and treats the rule as "never
//! matches"; it does not stop other rules from matching.
//!
//! ## Invariants
//!
//! - `Rule::order` is an index into `CompiledRules::patterns`; orders are dense
//!   (`0..rule_count`) because the loader only numbers rules it attaches.

use super::pattern::CompiledPattern;
use super::script::Script;
use crate::Rule;
use crate::error::PatternError;
use std::sync::Arc;

/// Compile result for each rule, indexed by `Rule::order`.
#[derive(Debug)]
pub struct CompiledRules {
    patterns: Vec<Result<CompiledPattern, PatternError>>,
}

impl CompiledRules {
    /// Compile every rule in `script`, top-level rules and all descendants.
    pub fn new(script: &Script) -> Self {
        let mut slots: Vec<Option<Result<CompiledPattern, PatternError>>> = Vec::new();
        slots.resize_with(script.rule_count(), || None);

        let mut pending: Vec<&Arc<Rule>> = script.top_rules().iter().collect();
        while let Some(rule) = pending.pop() {
            if let Some(slot) = slots.get_mut(rule.order) {
                *slot = Some(CompiledPattern::compile(&rule.pattern, script.definitions()));
            }
            pending.extend(rule.children.iter());
        }

        let patterns = slots.into_iter().map(|slot| slot.unwrap_or(Err(PatternError::NotCompiled))).collect();
        CompiledRules { patterns }
    }

    /// Compiled pattern for `order`, or the reason it could not be compiled.
    /// `None` only for an order that does not belong to this script.
    pub fn get(&self, order: usize) -> Option<Result<&CompiledPattern, &PatternError>> {
        self.patterns.get(order).map(Result::as_ref)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Number of rules whose pattern did not compile.
    pub fn failed(&self) -> usize {
        self.patterns.iter().filter(|p| p.is_err()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_nested_rules_with_late_definitions() {
        let src = "\
u: (i like ~colors) : nice
  u1: (really [~colors ~missing]) : hmm
~colors: [red blue]
";
        let script = Script::parse("t.top", src);
        let compiled = CompiledRules::new(&script);

        assert_eq!(compiled.len(), 2);
        assert_eq!(compiled.failed(), 1);
        assert!(compiled.get(0).unwrap().unwrap().is_match("i like blue"));
        assert_eq!(compiled.get(1).unwrap().unwrap_err(), &PatternError::UndefinedDefinition("missing".to_string()));
        assert!(compiled.get(2).is_none());
    }

    #[test]
    fn unreached_order_reports_not_compiled() {
        let mut script = Script::parse("t.top", "u: (hi) : hello\n");
        script.rule_count += 1;
        let compiled = CompiledRules::new(&script);

        assert_eq!(compiled.len(), 2);
        assert!(compiled.get(0).unwrap().is_ok());
        assert_eq!(compiled.get(1).unwrap().unwrap_err(), &PatternError::NotCompiled);
    }
}
