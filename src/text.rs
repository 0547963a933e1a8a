//! Text helpers shared by the script loader, the pattern compiler and the
//! output renderer.

use crate::error::PatternError;

/// Case-fold, turn `.,!?` into spaces and collapse whitespace.
///
/// ```text
/// "  I like RED.  " ──▶ "i like red"
/// ```
///
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let spaced = regex!(r"[.,!?]").replace_all(&lowered, " ");
    collapse_whitespace(&spaced)
}

/// Replace every whitespace run with a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    regex!(r"\s+").replace_all(text, " ").trim().to_string()
}

/// Split the inside of a `[...]` group into items.
///
/// Items are separated by whitespace; a double-quoted item may contain
/// whitespace. Empty items (`""`) are dropped.
pub(crate) fn split_choice_items(content: &str) -> Result<Vec<String>, PatternError> {
    let mut items = Vec::new();
    let mut rest = content;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').ok_or(PatternError::UnclosedQuote)?;
            items.push(quoted[..end].to_string());
            rest = &quoted[end + 1..];
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            items.push(rest[..end].to_string());
            rest = &rest[end..];
        }
    }

    items.retain(|item| !item.is_empty());
    Ok(items)
}

/// Byte offset of the `]` closing the group opened at `open`, skipping quoted text.
///
/// Groups do not nest in patterns: the first unquoted `]` closes.
pub(crate) fn find_closing_bracket(text: &str, open: usize) -> Option<usize> {
    let mut in_quote = false;
    for (idx, ch) in text[open + 1..].char_indices() {
        match ch {
            '"' => in_quote = !in_quote,
            ']' if !in_quote => return Some(open + 1 + idx),
            _ => {}
        }
    }
    None
}

/// Drop everything from the first unquoted `#`.
pub(crate) fn strip_comment(line: &str) -> &str {
    let mut in_quote = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quote = !in_quote,
            '#' if !in_quote => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Longest text handed to a speech synthesizer.
pub const MAX_SPOKEN_CHARS: usize = 140;

/// Make rendered text safe to pass to a TTS command line.
///
/// Control characters become spaces, whitespace is collapsed and the result
/// is cut to [`MAX_SPOKEN_CHARS`] characters.
pub fn sanitize_speech(text: &str) -> String {
    let cleaned = regex!(r"[\x00-\x1F\x7F]").replace_all(text, " ");
    let collapsed = collapse_whitespace(&cleaned);
    if collapsed.chars().count() <= MAX_SPOKEN_CHARS {
        return collapsed;
    }
    collapsed.chars().take(MAX_SPOKEN_CHARS).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_and_punctuation() {
        assert_eq!(normalize("  I like RED.  "), "i like red");
        assert_eq!(normalize("Hello,world!How   are\tyou?"), "hello world how are you");
        assert_eq!(normalize("...!?"), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in ["My Name is Zed!", "  a\n\nb  ", "Wait... what?", "", "ÉCOLE, élève"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn choice_items_support_quotes() {
        let items = split_choice_items(r#"hi hello "good morning"  "" ~greet"#).unwrap();
        assert_eq!(items, vec!["hi", "hello", "good morning", "~greet"]);
    }

    #[test]
    fn choice_items_reject_unclosed_quote() {
        assert_eq!(split_choice_items(r#"a "b c"#), Err(PatternError::UnclosedQuote));
    }

    #[test]
    fn closing_bracket_skips_quoted_text() {
        let text = r#"[a "x]y" b] rest"#;
        assert_eq!(find_closing_bracket(text, 0), Some(10));
        assert_eq!(find_closing_bracket("[open", 0), None);
    }

    #[test]
    fn comments_respect_quotes() {
        assert_eq!(strip_comment(r##"u: ("#1 fan") : yes # trailing"##), r##"u: ("#1 fan") : yes "##);
        assert_eq!(strip_comment("# whole line"), "");
        assert_eq!(strip_comment("no comment"), "no comment");
    }

    #[test]
    fn speech_is_sanitized_and_capped() {
        assert_eq!(sanitize_speech("hi\u{7}\tthere\n"), "hi there");
        let long = "word ".repeat(60);
        let out = sanitize_speech(&long);
        assert!(out.chars().count() <= MAX_SPOKEN_CHARS);
        assert!(out.starts_with("word word"));
    }
}
