use parley::{DialogueEngine, HardwareCall, ParseError, Rule, TurnResult};

mod ansi {
    const RESET: &str = "\x1b[0m";

    /// What a fragment of the report means. Each tone is one SGR code.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Tone {
        Good,
        Warn,
        Bad,
        Name,
        Label,
        Rule,
        Strong,
        Faint,
    }

    impl Tone {
        fn code(self) -> &'static str {
            match self {
                Tone::Good => "\x1b[32m",
                Tone::Warn => "\x1b[33m",
                Tone::Bad => "\x1b[31m",
                Tone::Name => "\x1b[34m",
                Tone::Label => "\x1b[36m",
                Tone::Rule => "\x1b[90m",
                Tone::Strong => "\x1b[1m",
                Tone::Faint => "\x1b[2m",
            }
        }
    }

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn tone(&self, text: impl AsRef<str>, tone: Tone) -> String {
            match self.enabled {
                true => format!("{}{}{RESET}", tone.code(), text.as_ref()),
                false => text.as_ref().to_string(),
            }
        }

        pub fn faint(&self, text: impl AsRef<str>) -> String {
            self.tone(text, Tone::Faint)
        }

        /// `━━━ title ━━━` section header.
        pub fn section(&self, title: &str) -> String {
            self.tone(format!("━━━ {title} ━━━"), Tone::Rule)
        }

        /// Green when `count` is zero, yellow otherwise.
        pub fn count(&self, count: usize) -> String {
            self.tone(count.to_string(), if count == 0 { Tone::Good } else { Tone::Warn })
        }
    }
}

use ansi::Tone;

/// `--check`: diagnostics, definitions and the rule tree with what each
/// pattern compiled to.
pub fn print_check(engine: &DialogueEngine, color: bool) {
    let palette = ansi::Palette::new(color);
    let script = engine.script();
    println!("\n{}", palette.tone(format!("⚙  Script: {}", script.name()), Tone::Label));

    println!("\n{}", palette.section("Diagnostics"));
    print_diagnostics(engine.errors(), &palette);

    println!("\n{}", palette.section("Definitions"));
    let definitions = engine.definitions();
    if definitions.is_empty() {
        println!("  {}", palette.faint("none"));
    }
    for name in definitions.names() {
        let items = definitions.get(name).unwrap_or_default();
        println!(
            "  {} {}",
            palette.tone(format!("~{name}"), Tone::Name),
            palette.faint(format!("{} option{}", items.len(), if items.len() == 1 { "" } else { "s" }))
        );
    }

    println!("\n{}", palette.section("Rules"));
    for rule in script.top_rules() {
        print_rule(engine, rule, &palette);
    }

    println!("\n{}", palette.section("Summary"));
    println!(
        "  Rules: {}  │  Top level: {}  │  Errors: {}  │  State: {}",
        palette.tone(script.rule_count().to_string(), Tone::Good),
        palette.tone(script.top_rules().len().to_string(), Tone::Label),
        palette.count(engine.errors().len()),
        palette.tone(engine.state().to_string(), Tone::Strong),
    );
    println!();
}

/// Diagnostics of a script that cannot run, to stderr.
pub fn print_boot_failure(engine: &DialogueEngine, color: bool) {
    let palette = ansi::Palette::new(color);
    eprintln!("{}", palette.tone("dialog script has fatal errors", Tone::Bad));
    for err in engine.errors() {
        eprintln!("  {}", fmt_diagnostic(err, &palette));
    }
}

fn print_diagnostics(errors: &[ParseError], palette: &ansi::Palette) {
    if errors.is_empty() {
        println!("  {}", palette.tone("✓ no problems", Tone::Good));
        return;
    }
    for err in errors {
        println!("  {}", fmt_diagnostic(err, palette));
    }
}

fn fmt_diagnostic(err: &ParseError, palette: &ansi::Palette) -> String {
    let severity = palette.tone(err.severity(), if err.fatal { Tone::Bad } else { Tone::Warn });
    format!(
        "{} {} {} {}",
        palette.tone(format!("line {:>3}", err.line), Tone::Rule),
        palette.tone(format!("[{}]", err.category), Tone::Name),
        severity,
        err.message
    )
}

fn print_rule(engine: &DialogueEngine, rule: &Rule, palette: &ansi::Palette) {
    let indent = "  ".repeat(rule.level + 1);
    let head = if rule.level == 0 { "u".to_string() } else { format!("u{}", rule.level) };
    let compiled = match engine.pattern_for(rule) {
        Some(Ok(pattern)) => {
            let features: Vec<String> = pattern.features().iter_names().map(|(name, _)| name.to_lowercase()).collect();
            palette.tone(format!("✓ {}", features.join(" ")), Tone::Good)
        }
        Some(Err(err)) => palette.tone(format!("✗ {err}"), Tone::Bad),
        None => palette.faint("not compiled"),
    };
    println!(
        "{indent}{} {} {} {}",
        palette.tone(format!("{head}: ({})", rule.pattern), Tone::Label),
        compiled,
        palette.faint("│"),
        palette.faint(format!("line {}: {}", rule.line, rule.output)),
    );
    for child in &rule.children {
        print_rule(engine, child, palette);
    }
}

/// One turn in human-readable form.
pub fn print_turn(input: &str, result: &TurnResult, color: bool) {
    let palette = ansi::Palette::new(color);
    let marker = if !result.ok {
        palette.tone("✗", Tone::Bad)
    } else if result.interrupt {
        palette.tone("■", Tone::Warn)
    } else if result.matched {
        palette.tone("✓", Tone::Good)
    } else {
        palette.faint("·")
    };

    println!("{} {} {}", marker, palette.faint(format!("> {input}")), palette.faint(format!("[{}]", result.state)));
    if let Some(error) = &result.error {
        println!("  {}", palette.tone(error, Tone::Bad));
    }
    if !result.spoken_text.is_empty() {
        println!("  {}", palette.tone(&result.spoken_text, Tone::Strong));
    }
    if !result.actions.is_empty() {
        let actions: Vec<String> = result.actions.iter().map(|a| format!("<{a}>")).collect();
        println!("  {}", palette.tone(actions.join(" "), Tone::Name));
    }
}

/// `--dry-run`: hardware calls the runner made.
pub fn print_calls(calls: &[HardwareCall], color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.section("Hardware calls"));
    if calls.is_empty() {
        println!("  {}", palette.faint("none"));
        return;
    }
    for (idx, call) in calls.iter().enumerate() {
        let arg = match call {
            HardwareCall::TurnLeft(v) | HardwareCall::TurnRight(v) | HardwareCall::HeadPan(v) | HardwareCall::HeadTilt(v) => {
                palette.tone(v.to_string(), Tone::Warn)
            }
            HardwareCall::Stop | HardwareCall::ArmRaise => String::new(),
        };
        println!("  {} {} {}", palette.tone(format!("[{idx}]"), Tone::Rule), palette.tone(call.name(), Tone::Label), arg);
    }
}

#[cfg(test)]
mod tests {
    use super::ansi::{Palette, Tone};

    #[test]
    fn disabled_palette_leaves_text_plain() {
        let palette = Palette::new(false);
        assert_eq!(palette.tone("ok", Tone::Good), "ok");
        assert_eq!(palette.section("Rules"), "━━━ Rules ━━━");
        assert_eq!(palette.count(3), "3");
    }

    #[test]
    fn enabled_palette_wraps_and_resets() {
        let palette = Palette::new(true);
        assert_eq!(palette.tone("bad", Tone::Bad), "\x1b[31mbad\x1b[0m");
        assert_eq!(palette.faint("·"), "\x1b[2m·\x1b[0m");
        assert_eq!(palette.count(0), "\x1b[32m0\x1b[0m");
        assert_eq!(palette.count(2), "\x1b[33m2\x1b[0m");
    }
}
