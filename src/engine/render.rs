//! Output rendering.
//!
//! A rule's output template is expanded in a fixed order:
//!
//! ```text
//! "[hi hello] $name, ~mood <head_yes>"
//!   1. innermost [..] group   -> one random item     "hello $name, ~mood <head_yes>"
//!   2. ~definition            -> one random item     "hello $name, great <head_yes>"
//!   3. $variable              -> bound value/fallback "hello zed, great <head_yes>"
//!   4. collapse whitespace
//!   5. split <action> tokens  -> spoken "hello zed, great", actions ["head_yes"]
//! ```
//!
//! Step 1 repeats, innermost group first, at most `iteration_cap` times so a
//! malformed template cannot loop forever.

use crate::Definitions;
use crate::text::{collapse_whitespace, split_choice_items};
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Captures;
use std::collections::HashMap;

/// Rendered output split into speech and action tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rendered {
    pub spoken: String,
    pub actions: Vec<String>,
}

/// Borrowed view of everything rendering needs besides the RNG.
pub(crate) struct Renderer<'a> {
    pub definitions: &'a Definitions,
    pub variables: &'a HashMap<String, String>,
    pub unknown_variable_text: &'a str,
    pub iteration_cap: usize,
}

impl Renderer<'_> {
    pub fn render<R: Rng + ?Sized>(&self, template: &str, rng: &mut R) -> Rendered {
        let expanded = self.expand(template, rng);
        extract_actions(&expanded)
    }

    /// Steps 1-4: choices, definitions, variables, whitespace.
    pub fn expand<R: Rng + ?Sized>(&self, template: &str, rng: &mut R) -> String {
        let mut text = template.to_string();

        for _ in 0..self.iteration_cap {
            let Some(caps) = regex!(r"\[([^\[\]]+)\]").captures(&text) else {
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };
            let items = split_choice_items(&caps[1]).unwrap_or_default();
            let replacement = items.choose(rng).cloned().unwrap_or_default();
            let range = whole.range();
            text.replace_range(range, &replacement);
        }

        let text = regex!(r"~([A-Za-z_][A-Za-z0-9_]*)").replace_all(&text, |caps: &Captures<'_>| {
            self.definitions.get(&caps[1]).and_then(|items| items.choose(rng)).cloned().unwrap_or_default()
        });

        let text = regex!(r"\$([A-Za-z_][A-Za-z0-9_]*)").replace_all(&text, |caps: &Captures<'_>| {
            match self.variables.get(&caps[1]) {
                Some(value) if !value.is_empty() => value.clone(),
                _ => self.unknown_variable_text.to_string(),
            }
        });

        collapse_whitespace(&text)
    }
}

/// Step 5: pull `<action>` tokens out in order; the rest is the spoken text.
pub(crate) fn extract_actions(text: &str) -> Rendered {
    let action_re = regex!(r"<([A-Za-z_][A-Za-z0-9_]*)>");
    let actions = action_re.captures_iter(text).map(|caps| caps[1].to_string()).collect();
    let spoken = collapse_whitespace(&action_re.replace_all(text, " "));
    Rendered { spoken, actions }
}

/// First `$variable` referenced by an output template.
pub(crate) fn first_variable(template: &str) -> Option<&str> {
    regex!(r"\$([A-Za-z_][A-Za-z0-9_]*)").captures(template).and_then(|caps| caps.get(1)).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn render(template: &str, variables: &HashMap<String, String>) -> Rendered {
        let definitions: Definitions =
            [("mood", vec!["great".to_string()]), ("two", vec!["x".to_string(), "y".to_string()])].into_iter().collect();
        let renderer = Renderer { definitions: &definitions, variables, unknown_variable_text: "I don't know", iteration_cap: 20 };
        renderer.render(template, &mut StdRng::seed_from_u64(7))
    }

    #[test]
    fn expands_definitions_variables_and_actions() {
        let vars = HashMap::from([("name".to_string(), "zed".to_string())]);
        let out = render("hello   $name, I feel ~mood <head_yes> ok <dance90>", &vars);
        assert_eq!(out.spoken, "hello zed, I feel great ok");
        assert_eq!(out.actions, vec!["head_yes", "dance90"]);
    }

    #[test]
    fn unknown_or_empty_variables_use_fallback() {
        let vars = HashMap::from([("empty".to_string(), String::new())]);
        assert_eq!(render("you said $x", &vars).spoken, "you said I don't know");
        assert_eq!(render("you said $empty", &vars).spoken, "you said I don't know");
    }

    #[test]
    fn choices_pick_one_item_innermost_first() {
        let vars = HashMap::new();
        let single = render(r#"["only one"] here"#, &vars);
        assert_eq!(single.spoken, "only one here");

        let nested = render("[a [b]]", &vars);
        assert!(nested.spoken == "a" || nested.spoken == "b", "{nested:?}");

        for _ in 0..10 {
            let out = render("[one two] ~two", &vars);
            let words: Vec<&str> = out.spoken.split(' ').collect();
            assert!(matches!(words[0], "one" | "two"));
            assert!(matches!(words[1], "x" | "y"));
        }
    }

    #[test]
    fn malformed_groups_become_empty() {
        let vars = HashMap::new();
        assert_eq!(render(r#"say [ "unterminated ] now"#, &vars).spoken, "say now");
        assert_eq!(render("say [   ] now", &vars).spoken, "say now");
        assert_eq!(render("undefined ~nothing here", &vars).spoken, "undefined here");
    }

    #[test]
    fn iteration_cap_bounds_expansion() {
        let definitions = Definitions::default();
        let variables = HashMap::new();
        let renderer = Renderer { definitions: &definitions, variables: &variables, unknown_variable_text: "?", iteration_cap: 1 };
        let out = renderer.expand("[a] [b]", &mut StdRng::seed_from_u64(1));
        assert_eq!(out, "a [b]");
    }

    #[test]
    fn same_seed_same_output() {
        let definitions: Definitions = [("n", (0..50).map(|i| i.to_string()).collect::<Vec<_>>())].into_iter().collect();
        let variables = HashMap::new();
        let renderer = Renderer { definitions: &definitions, variables: &variables, unknown_variable_text: "?", iteration_cap: 20 };
        let a = renderer.expand("~n ~n ~n", &mut StdRng::seed_from_u64(99));
        let b = renderer.expand("~n ~n ~n", &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn first_variable_is_leftmost() {
        assert_eq!(first_variable("hi $name and $other"), Some("name"));
        assert_eq!(first_variable("no vars"), None);
    }
}
