//! Pattern compiler.
//!
//! Turns one rule's pattern string into an anchored, case-insensitive regex
//! plus the list of wildcard capture slots.
//!
//! ## Pattern language
//!
//! Tokens are read left to right; whitespace between them is ignored.
//!
//! ```text
//! "good morning"      quoted literal, normalized, inner spaces -> \s+
//! [hi hello "hey you"] choice group; ~name items union a definition in
//! ~name               shorthand for [~name]
//! _                   wildcard capture slot, one or more words, non-greedy
//! word                bare literal, normalized
//! ```
//!
//! The compiled regex is `^tok(\s+tok)*$`, so the *whole* normalized input
//! must match.
//!
//! ## Example
//!
//! ```text
//! definitions: ~colors = [red blue "sky blue"]
//! pattern:     i like ~colors and _
//! regex:       (?i)^i\s+like\s+(?:red|blue|sky\s+blue)\s+and\s+(.+?)$
//! slots:       [1]
//! ```

use crate::Definitions;
use crate::error::PatternError;
use crate::text::{find_closing_bracket, normalize, split_choice_items};
use regex::{Regex, RegexBuilder};

bitflags::bitflags! {
    /// Kinds of tokens a compiled pattern contains.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PatternFeatures: u8 {
        const LITERAL    = 1 << 0;
        const CHOICE     = 1 << 1;
        const DEFINITION = 1 << 2;
        const WILDCARD   = 1 << 3;
    }
}

/// A rule pattern ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    capture_slots: Vec<usize>,
    features: PatternFeatures,
}

impl CompiledPattern {
    /// Compile `pattern` against the script's `definitions`.
    pub fn compile(pattern: &str, definitions: &Definitions) -> Result<Self, PatternError> {
        let mut pieces: Vec<String> = Vec::new();
        let mut capture_slots = Vec::new();
        let mut features = PatternFeatures::empty();
        let mut pos = 0;

        while let Some(ch) = pattern[pos..].chars().next() {
            if ch.is_whitespace() {
                pos += ch.len_utf8();
                continue;
            }

            match ch {
                '[' => {
                    let close = find_closing_bracket(pattern, pos).ok_or(PatternError::UnclosedBracket)?;
                    let items = split_choice_items(&pattern[pos + 1..close])?;
                    if items.is_empty() {
                        return Err(PatternError::EmptyChoice);
                    }

                    let mut alternatives = Vec::new();
                    for item in &items {
                        match item.strip_prefix('~') {
                            Some(name) => {
                                alternatives.extend(definition_alternatives(name, definitions)?);
                                features |= PatternFeatures::DEFINITION;
                            }
                            None => alternatives.extend(literal_regex(item)),
                        }
                    }
                    if alternatives.is_empty() {
                        return Err(PatternError::EmptyChoiceAfterNormalization);
                    }

                    features |= PatternFeatures::CHOICE;
                    pieces.push(format!("(?:{})", alternatives.join("|")));
                    pos = close + 1;
                }
                ']' => return Err(PatternError::StrayClosingBracket),
                '"' => {
                    let body = &pattern[pos + 1..];
                    let len = body.find('"').ok_or(PatternError::UnclosedQuote)?;
                    if let Some(literal) = literal_regex(&body[..len]) {
                        features |= PatternFeatures::LITERAL;
                        pieces.push(literal);
                    }
                    pos += len + 2;
                }
                '~' => {
                    let body = &pattern[pos + 1..];
                    let len = body.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(body.len());
                    let name = &body[..len];
                    let alternatives = definition_alternatives(name, definitions)?;
                    if alternatives.is_empty() {
                        return Err(PatternError::EmptyDefinition(name.to_string()));
                    }

                    features |= PatternFeatures::DEFINITION;
                    pieces.push(format!("(?:{})", alternatives.join("|")));
                    pos += len + 1;
                }
                '_' => {
                    capture_slots.push(capture_slots.len() + 1);
                    features |= PatternFeatures::WILDCARD;
                    pieces.push("(.+?)".to_string());
                    pos += 1;
                }
                _ => {
                    let body = &pattern[pos..];
                    let len = body
                        .find(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | '"'))
                        .unwrap_or(body.len());
                    if let Some(literal) = literal_regex(&body[..len]) {
                        features |= PatternFeatures::LITERAL;
                        pieces.push(literal);
                    }
                    pos += len;
                }
            }
        }

        if pieces.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let source = format!(r"^{}$", pieces.join(r"\s+"));
        let regex = RegexBuilder::new(&source).case_insensitive(true).build()?;

        Ok(CompiledPattern { regex, capture_slots, features })
    }

    /// Match a normalized input. Returns the trimmed capture values, one per
    /// slot in order of appearance, or `None` when the input does not match.
    pub fn captures(&self, normalized: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(normalized)?;
        Some(
            (1..caps.len())
                .map(|idx| caps.get(idx).map(|m| m.as_str().trim().to_string()).unwrap_or_default())
                .collect(),
        )
    }

    pub fn is_match(&self, normalized: &str) -> bool {
        self.regex.is_match(normalized)
    }

    /// 1-based wildcard slot numbers.
    pub fn capture_slots(&self) -> &[usize] {
        &self.capture_slots
    }

    pub fn has_wildcard(&self) -> bool {
        self.features.contains(PatternFeatures::WILDCARD)
    }

    pub fn features(&self) -> PatternFeatures {
        self.features
    }

    /// The generated regex source (for diagnostics).
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Normalize `text` and turn it into an escaped regex where word gaps are `\s+`.
/// `None` when nothing survives normalization.
fn literal_regex(text: &str) -> Option<String> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }
    Some(normalized.split(' ').map(regex::escape).collect::<Vec<_>>().join(r"\s+"))
}

fn definition_alternatives(name: &str, definitions: &Definitions) -> Result<Vec<String>, PatternError> {
    let items = definitions.get(name).ok_or_else(|| PatternError::UndefinedDefinition(name.to_string()))?;
    Ok(items.iter().filter_map(|item| literal_regex(item)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Definitions {
        [
            ("colors", vec!["red".to_string(), "blue".to_string(), "sky blue".to_string()]),
            ("greet", vec!["hi".to_string(), "Hello!".to_string()]),
            ("blank", vec!["...".to_string()]),
        ]
        .into_iter()
        .collect()
    }

    fn compile(pattern: &str) -> CompiledPattern {
        CompiledPattern::compile(pattern, &defs()).unwrap()
    }

    #[test]
    fn literal_words_match_whole_input_only() {
        let p = compile("hello there");
        assert!(p.is_match("hello there"));
        assert!(p.is_match("HELLO   there"));
        assert!(!p.is_match("hello there friend"));
        assert!(!p.is_match("oh hello there"));
        assert_eq!(p.features(), PatternFeatures::LITERAL);
    }

    #[test]
    fn quoted_literal_is_normalized() {
        let p = compile(r#""Good, Morning!" robot"#);
        assert!(p.is_match("good morning robot"));
    }

    #[test]
    fn choice_group_accepts_any_alternative() {
        let p = compile(r#"[hi hello "good day"] robot"#);
        assert!(p.is_match("hi robot"));
        assert!(p.is_match("good day robot"));
        assert!(!p.is_match("good robot"));
        assert!(p.features().contains(PatternFeatures::CHOICE));
    }

    #[test]
    fn choice_group_unions_definitions() {
        let p = compile("[~greet hey] you");
        assert!(p.is_match("hello you"));
        assert!(p.is_match("hey you"));
        assert!(p.features().contains(PatternFeatures::DEFINITION));
    }

    #[test]
    fn bare_definition_reference() {
        let p = compile("i like ~colors");
        assert!(p.is_match("i like red"));
        assert!(p.is_match("i like sky blue"));
        assert!(!p.is_match("i like green"));
    }

    #[test]
    fn wildcard_captures_in_order() {
        let p = compile("my name is _");
        assert_eq!(p.captures("my name is zed"), Some(vec!["zed".to_string()]));
        assert_eq!(p.captures("my name is zed the great"), Some(vec!["zed the great".to_string()]));
        assert_eq!(p.captures("my name is"), None);
        assert_eq!(p.capture_slots(), &[1]);
        assert!(p.has_wildcard());

        let two = compile("_ and _");
        assert_eq!(two.captures("salt and pepper and oil"), Some(vec!["salt".to_string(), "pepper and oil".to_string()]));
        assert_eq!(two.capture_slots(), &[1, 2]);
    }

    #[test]
    fn no_captures_without_wildcard() {
        let p = compile("hello");
        assert_eq!(p.captures("hello"), Some(vec![]));
        assert!(!p.has_wildcard());
    }

    #[test]
    fn compile_errors() {
        let d = defs();
        let cases = [
            ("[hi hello", PatternError::UnclosedBracket),
            ("hi ] hello [", PatternError::StrayClosingBracket),
            (r#""open quote"#, PatternError::UnclosedQuote),
            (r#"[a "b]"#, PatternError::UnclosedBracket),
            ("~missing", PatternError::UndefinedDefinition("missing".to_string())),
            ("[~missing x]", PatternError::UndefinedDefinition("missing".to_string())),
            ("[]", PatternError::EmptyChoice),
            ("[. !]", PatternError::EmptyChoiceAfterNormalization),
            ("~blank", PatternError::EmptyDefinition("blank".to_string())),
            (r#""" ..."#, PatternError::EmptyPattern),
            ("", PatternError::EmptyPattern),
        ];
        for (pattern, expected) in cases {
            let err = CompiledPattern::compile(pattern, &d).unwrap_err();
            assert_eq!(err, expected, "pattern {pattern:?}");
        }
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        let p = compile("a+b (c)");
        assert!(p.is_match("a+b (c)"));
        assert!(!p.is_match("aab c"));
    }
}
