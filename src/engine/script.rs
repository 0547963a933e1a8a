//! Script loading: definitions, rules and the nested rule tree.
//!
//! A script is line oriented. After stripping an unquoted `#` comment, every
//! non-blank line is one of:
//!
//! ```text
//! ~name: [item "multi word item" ...]      definition
//! u<level>: (pattern) : output             rule (level defaults to 0)
//! ```
//!
//! ## Tree building
//!
//! The loader remembers the last rule seen at every level. A rule at level
//! `L > 0` becomes a child of the remembered rule at `L - 1`; a level-0 rule
//! becomes a new top-level rule. After attaching a rule at `L`, everything
//! remembered deeper than `L` is forgotten.
//!
//! ```text
//! u:  (a)  ─┬─ u1: (b) ── u2: (c)
//!           └─ u1: (d)               (d forgets c)
//! u:  (e)                            (e forgets b, d)
//! u2: (f)                            error: no active parent u1
//! ```
//!
//! Problems never abort loading. Each one is recorded as a [`ParseError`] and
//! the offending line is skipped; only a script with no surviving top-level
//! rule gets a fatal error.

use crate::error::{ErrorCategory, ParseError, ScriptError};
use crate::text::{split_choice_items, strip_comment};
use crate::{Definitions, MAX_RULE_LEVEL, Rule};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A loaded script: definitions, the rule tree and load diagnostics.
#[derive(Debug)]
pub struct Script {
    pub(crate) name: String,
    pub(crate) definitions: Definitions,
    pub(crate) top_rules: Arc<[Arc<Rule>]>,
    pub(crate) errors: Vec<ParseError>,
    pub(crate) rule_count: usize,
}

/// Rule under construction; children are indexes into the draft arena.
struct Draft {
    level: usize,
    pattern: String,
    output: String,
    line: usize,
    children: Vec<usize>,
}

impl Script {
    /// Read and parse a script file. Only I/O failures are errors here;
    /// script problems end up in [`Script::errors`].
    pub fn load(path: impl AsRef<Path>) -> Result<Script, ScriptError> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|source| ScriptError::Io { path: path.to_path_buf(), source })?;
        Ok(Script::parse(&path.display().to_string(), &source))
    }

    /// Parse script text. `name` is only used to label diagnostics.
    pub fn parse(name: &str, source: &str) -> Script {
        let mut definitions = Definitions::default();
        let mut errors = Vec::new();
        let mut drafts: Vec<Draft> = Vec::new();
        let mut roots: Vec<usize> = Vec::new();
        let mut last_by_level: [Option<usize>; MAX_RULE_LEVEL + 1] = [None; MAX_RULE_LEVEL + 1];

        for (idx, raw) in source.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(caps) = regex!(r"^\s*~([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.+?)\s*$").captures(line) {
                let def_name = &caps[1];
                match parse_definition_items(caps[2].trim()) {
                    Ok(items) => {
                        debug!(definition = def_name, items = items.len(), "definition loaded");
                        definitions.insert(def_name, items);
                    }
                    Err(message) => {
                        errors.push(ParseError::non_fatal(name, line_no, ErrorCategory::Definition, message));
                    }
                }
                continue;
            }

            let Some(caps) = regex!(r"^\s*u(\d*)\s*:\s*\((.*?)\)\s*:\s*(.+?)\s*$").captures(line) else {
                errors.push(ParseError::non_fatal(
                    name,
                    line_no,
                    ErrorCategory::Syntax,
                    "line is not a valid definition or rule",
                ));
                continue;
            };

            let level = match &caps[1] {
                "" => Some(0),
                digits => digits.parse::<usize>().ok(),
            };
            let Some(level) = level.filter(|&level| level <= MAX_RULE_LEVEL) else {
                errors.push(ParseError::non_fatal(
                    name,
                    line_no,
                    ErrorCategory::Nesting,
                    "rule level too deep to be usable",
                ));
                continue;
            };

            let pattern = caps[2].trim();
            let output = caps[3].trim();

            if !brackets_balanced(pattern) {
                errors.push(ParseError::non_fatal(name, line_no, ErrorCategory::Pattern, "unbalanced [] in pattern"));
                continue;
            }
            if !brackets_balanced(output) {
                errors.push(ParseError::non_fatal(name, line_no, ErrorCategory::Output, "unbalanced [] in output"));
                continue;
            }

            let parent = match level {
                0 => None,
                _ => match last_by_level[level - 1] {
                    Some(parent) => Some(parent),
                    None => {
                        errors.push(ParseError::non_fatal(
                            name,
                            line_no,
                            ErrorCategory::Nesting,
                            format!("u{level} has no active parent u{}", level - 1),
                        ));
                        continue;
                    }
                },
            };

            let id = drafts.len();
            drafts.push(Draft {
                level,
                pattern: pattern.to_string(),
                output: output.to_string(),
                line: line_no,
                children: Vec::new(),
            });
            match parent {
                Some(parent) => drafts[parent].children.push(id),
                None => roots.push(id),
            }

            last_by_level[level] = Some(id);
            for deeper in last_by_level.iter_mut().skip(level + 1) {
                *deeper = None;
            }
        }

        if roots.is_empty() {
            errors.push(ParseError::fatal(name, 0, "no valid top-level u: rules found"));
        }

        let rule_count = drafts.len();
        let top_rules = freeze(drafts, &roots);

        Script { name: name.to_string(), definitions, top_rules, errors, rule_count }
    }

    /// Label used in diagnostics (usually the file path).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    /// Top-level rules in file order.
    pub fn top_rules(&self) -> &[Arc<Rule>] {
        &self.top_rules
    }

    /// Load diagnostics in line order.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn has_fatal_errors(&self) -> bool {
        self.errors.iter().any(|e| e.fatal)
    }

    /// Number of rules that made it into the tree (all levels).
    pub fn rule_count(&self) -> usize {
        self.rule_count
    }
}

fn parse_definition_items(rhs: &str) -> Result<Vec<String>, String> {
    let body = rhs
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| "definition must use [ ... ] list".to_string())?;
    let items = split_choice_items(body).map_err(|err| err.to_string())?;
    if items.is_empty() {
        return Err("empty definition list".to_string());
    }
    Ok(items)
}

fn brackets_balanced(text: &str) -> bool {
    text.matches('[').count() == text.matches(']').count()
}

/// Turn the draft arena into the shared rule tree.
///
/// A child is always pushed after its parent, so walking the arena backwards
/// builds every child before the parent that owns it.
fn freeze(drafts: Vec<Draft>, roots: &[usize]) -> Arc<[Arc<Rule>]> {
    let mut built: Vec<Option<Arc<Rule>>> = vec![None; drafts.len()];

    for (order, draft) in drafts.into_iter().enumerate().rev() {
        let children = draft.children.iter().filter_map(|&child| built[child].take()).collect();
        built[order] = Some(Arc::new(Rule {
            level: draft.level,
            pattern: draft.pattern,
            output: draft.output,
            line: draft.line,
            order,
            children,
        }));
    }

    roots.iter().filter_map(|&root| built[root].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(script: &Script) -> Vec<(usize, ErrorCategory)> {
        script.errors().iter().map(|e| (e.line, e.category)).collect()
    }

    #[test]
    fn builds_nested_tree_in_file_order() {
        let src = "\
~colors: [red blue]
u: (hello) : hi there      # greeting
  u1: (how are you) : fine
    u2: (really) : really
  u1: (bye) : see you
u: (again) : once more
";
        let script = Script::parse("t.top", src);
        assert!(script.errors().is_empty(), "{:?}", script.errors());
        assert_eq!(script.rule_count(), 5);
        assert_eq!(script.definitions().get("colors").unwrap(), &["red".to_string(), "blue".to_string()]);

        let top = script.top_rules();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].output, "hi there");
        assert_eq!(top[0].order, 0);
        assert_eq!(top[0].children.len(), 2);
        assert_eq!(top[0].children[0].pattern, "how are you");
        assert_eq!(top[0].children[0].children[0].level, 2);
        assert_eq!(top[0].children[1].line, 5);
        assert_eq!(top[1].order, 4);
    }

    #[test]
    fn orphan_rule_after_shallower_sibling_is_rejected() {
        let src = "\
u: (a) : A
u1: (b) : B
u2: (c) : C
u1: (d) : D
u3: (e) : E
";
        let script = Script::parse("t.top", src);
        assert_eq!(categories(&script), vec![(5, ErrorCategory::Nesting)]);
        assert_eq!(script.errors()[0].message, "u3 has no active parent u2");
        assert_eq!(script.top_rules()[0].children.len(), 2);
    }

    #[test]
    fn classifies_bad_lines_and_keeps_going() {
        let src = "\
~bad: red blue
~empty: []
~quote: [\"open]
this is not a rule
u8: (too deep) : nope
u: ([unbalanced) : x
u: (ok) : [unbalanced
u: (fine) : fine
";
        let script = Script::parse("t.top", src);
        assert_eq!(
            categories(&script),
            vec![
                (1, ErrorCategory::Definition),
                (2, ErrorCategory::Definition),
                (3, ErrorCategory::Definition),
                (4, ErrorCategory::Syntax),
                (5, ErrorCategory::Nesting),
                (6, ErrorCategory::Pattern),
                (7, ErrorCategory::Output),
            ]
        );
        assert!(!script.has_fatal_errors());
        assert_eq!(script.top_rules().len(), 1);
        assert_eq!(script.errors()[0].message, "definition must use [ ... ] list");
        assert_eq!(script.errors()[1].message, "empty definition list");
    }

    #[test]
    fn level_seven_loads_but_eight_does_not() {
        let mut src = String::from("u: (l0) : 0\n");
        for level in 1..=8 {
            src.push_str(&format!("u{level}: (l{level}) : {level}\n"));
        }
        let script = Script::parse("t.top", &src);
        assert_eq!(categories(&script), vec![(9, ErrorCategory::Nesting)]);
        assert_eq!(script.rule_count(), 8);
    }

    #[test]
    fn no_top_level_rule_is_fatal() {
        let script = Script::parse("t.top", "# only a comment\n~a: [x]\n");
        assert!(script.has_fatal_errors());
        let fatal = script.errors().last().unwrap();
        assert_eq!(fatal.line, 0);
        assert_eq!(fatal.category, ErrorCategory::Fatal);
    }

    #[test]
    fn later_definition_replaces_earlier() {
        let script = Script::parse("t.top", "~x: [a]\n~x: [b c]\nu: (hi) : ~x\n");
        assert_eq!(script.definitions().get("x").unwrap().len(), 2);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Script::load("/definitely/not/here.top").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.top"));
    }
}
