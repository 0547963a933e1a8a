//! Dialogue state machine.
//!
//! One [`DialogueEngine`] owns everything a conversation mutates: the scope
//! stack, captured variables, the unmatched counter and the RNG. Callers run
//! one turn at a time through [`DialogueEngine::handle_input`]; the engine is
//! not meant to be driven from several threads at once.
//!
//! ## States
//!
//! ```text
//!            fatal load error
//!   BOOT ◀──────────────────── load
//!                                │
//!                                v
//!   IDLE ──match──▶ IN_SCOPE(n) ──match child──▶ IN_SCOPE(n+1)
//!    ▲                 │  │
//!    │  interrupt word │  └─ 4 unmatched turns / depth guard
//!    └─────────────────┴────────────────────────────────────┘
//! ```
//!
//! ## One turn
//!
//! ```text
//! normalize ─▶ empty? ─▶ interrupt word? ─▶ innermost scope children
//!                                              │ (first match wins)
//!                                              └─▶ top-level rules
//!   no match: count if in scope, reset at threshold
//!   match:    depth guard ─▶ scope update ─▶ capture ─▶ render
//! ```

use super::compiled_rules::CompiledRules;
use super::pattern::CompiledPattern;
use super::render::{Renderer, first_variable};
use super::scope::ScopeStack;
use super::script::Script;
use crate::api::{DialogueOptions, TurnResult};
use crate::error::{ErrorCategory, ParseError, PatternError, ScriptError};
use crate::text::normalize;
use crate::{Definitions, Rule};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Words that abort the conversation wherever they appear in the input.
pub const INTERRUPT_WORDS: [&str; 4] = ["stop", "cancel", "reset", "quit"];

/// Externally observable dialogue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogueState {
    /// The script had a fatal error; every turn is refused.
    Boot,
    /// No active scope.
    Idle,
    /// Inside a scope of the given depth (>= 1).
    InScope(usize),
}

impl fmt::Display for DialogueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialogueState::Boot => f.write_str("BOOT"),
            DialogueState::Idle => f.write_str("IDLE"),
            DialogueState::InScope(depth) => write!(f, "IN_SCOPE({depth})"),
        }
    }
}

impl Serialize for DialogueState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where a matching rule was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Scoped,
    TopLevel,
}

/// A loaded script plus the per-conversation state that runs on it.
#[derive(Debug)]
pub struct DialogueEngine {
    script: Script,
    compiled: CompiledRules,
    options: DialogueOptions,
    rng: StdRng,
    diagnostics: Vec<ParseError>,
    reported_patterns: HashSet<usize>,
    variables: HashMap<String, String>,
    scope: ScopeStack,
    unmatched_in_scope: usize,
    state: DialogueState,
}

impl DialogueEngine {
    /// Build an engine for an already parsed script.
    pub fn new(mut script: Script, options: DialogueOptions) -> Self {
        let compiled = CompiledRules::new(&script);
        let diagnostics = std::mem::take(&mut script.errors);
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let state = if diagnostics.iter().any(|e| e.fatal) { DialogueState::Boot } else { DialogueState::Idle };

        info!(
            script = script.name(),
            rules = script.rule_count(),
            definitions = script.definitions().len(),
            patterns = compiled.len(),
            failed_patterns = compiled.failed(),
            errors = diagnostics.len(),
            state = %state,
            "dialogue script loaded"
        );
        for err in &diagnostics {
            warn!("{err}");
        }

        DialogueEngine {
            script,
            compiled,
            options,
            rng,
            diagnostics,
            reported_patterns: HashSet::new(),
            variables: HashMap::new(),
            scope: ScopeStack::default(),
            unmatched_in_scope: 0,
            state,
        }
    }

    /// Parse `source` and build an engine. `name` labels diagnostics.
    pub fn from_source(name: &str, source: &str, options: DialogueOptions) -> Self {
        Self::new(Script::parse(name, source), options)
    }

    /// Read a script file and build an engine.
    pub fn from_file(path: impl AsRef<Path>, options: DialogueOptions) -> Result<Self, ScriptError> {
        Ok(Self::new(Script::load(path)?, options))
    }

    /// Run one turn.
    pub fn handle_input(&mut self, text: &str) -> TurnResult {
        if self.has_fatal_errors() {
            return TurnResult::failure(self.state, "dialog script has fatal errors");
        }

        let normalized = normalize(text);
        if normalized.is_empty() {
            self.sync_state();
            return TurnResult::no_match(self.state);
        }

        if normalized.split(' ').any(|word| INTERRUPT_WORDS.contains(&word)) {
            self.interrupt_now();
            return TurnResult::interrupted(self.state, &self.options.interrupt_reply);
        }

        let mut found = None;
        if let Some(scope_rule) = self.scope.innermost().cloned() {
            found = self.first_match(&scope_rule.children, &normalized).map(|m| (m, Origin::Scoped));
        }
        if found.is_none() {
            let top_rules = Arc::clone(&self.script.top_rules);
            found = self.first_match(&top_rules, &normalized).map(|m| (m, Origin::TopLevel));
        }

        let Some(((rule, captures), origin)) = found else {
            if !self.scope.is_empty() {
                self.unmatched_in_scope += 1;
                if self.unmatched_in_scope >= self.options.unmatched_reset_threshold {
                    let reason = format!("{} unmatched inputs in nested scope", self.unmatched_in_scope);
                    self.reset_to_idle(&reason);
                }
            }
            self.sync_state();
            debug!(input = text, state = %self.state, "no match");
            return TurnResult::no_match(self.state);
        };

        self.unmatched_in_scope = 0;

        let depth_after_match = rule.level + 1;
        if depth_after_match > self.options.max_depth {
            self.reset_to_idle(&format!("max depth exceeded at line {}", rule.line));
            let message = format!("attempted to activate depth {depth_after_match} > {}", self.options.max_depth);
            warn!(line = rule.line, level = rule.level, "{message}");
            self.diagnostics.push(ParseError::non_fatal(
                self.script.name(),
                rule.line,
                ErrorCategory::DepthGuard,
                message,
            ));
            return TurnResult::no_match(self.state);
        }

        match origin {
            Origin::Scoped => self.scope.enter_scoped(Arc::clone(&rule)),
            Origin::TopLevel => self.scope.enter_top_level(Arc::clone(&rule)),
        }

        // Only the first capture is bound, and only to the first variable the
        // output mentions. `captures` is empty unless the pattern has a wildcard.
        if let (Some(value), Some(variable)) = (captures.first(), first_variable(&rule.output)) {
            self.variables.insert(variable.to_string(), value.clone());
        }

        let renderer = Renderer {
            definitions: &self.script.definitions,
            variables: &self.variables,
            unknown_variable_text: &self.options.unknown_variable_text,
            iteration_cap: self.options.render_iteration_cap,
        };
        let rendered = renderer.render(&rule.output, &mut self.rng);
        self.sync_state();

        info!(line = rule.line, level = rule.level, state = %self.state, "matched");
        TurnResult::matched(self.state, rendered.spoken, rendered.actions)
    }

    /// First rule in `candidates` whose pattern accepts `normalized`, with its captures.
    fn first_match(&mut self, candidates: &[Arc<Rule>], normalized: &str) -> Option<(Arc<Rule>, Vec<String>)> {
        for rule in candidates {
            let attempt = match self.compiled.get(rule.order) {
                Some(Ok(pattern)) => Ok(pattern.captures(normalized)),
                Some(Err(err)) => Err(err.clone()),
                None => Ok(None),
            };
            match attempt {
                Ok(Some(captures)) => return Some((Arc::clone(rule), captures)),
                Ok(None) => {}
                Err(err) => self.report_pattern_error(rule, err),
            }
        }
        None
    }

    /// Record a rule whose pattern cannot compile. Logged on every attempt,
    /// kept in the diagnostics once per rule.
    fn report_pattern_error(&mut self, rule: &Rule, err: PatternError) {
        warn!(line = rule.line, pattern = %rule.pattern, "runtime pattern error: {err}");
        if self.reported_patterns.insert(rule.order) {
            self.diagnostics.push(ParseError::non_fatal(
                self.script.name(),
                rule.line,
                ErrorCategory::Pattern,
                format!("runtime pattern error: {err}"),
            ));
        }
    }

    /// Drop the scope stack and unmatched counter.
    pub fn reset_to_idle(&mut self, reason: &str) {
        if !reason.is_empty() {
            info!(reason, "reset to IDLE");
        }
        self.scope.clear();
        self.unmatched_in_scope = 0;
        if self.state != DialogueState::Boot {
            self.state = DialogueState::Idle;
        }
    }

    /// Same reset an interrupt word triggers.
    pub fn interrupt_now(&mut self) {
        self.reset_to_idle("global interrupt");
    }

    fn sync_state(&mut self) {
        if self.state == DialogueState::Boot {
            return;
        }
        self.state = match self.scope.depth() {
            0 => DialogueState::Idle,
            depth => DialogueState::InScope(depth),
        };
    }

    pub fn state(&self) -> DialogueState {
        self.state
    }

    pub fn scope_depth(&self) -> usize {
        self.scope.depth()
    }

    pub fn scope(&self) -> &ScopeStack {
        &self.scope
    }

    /// Consecutive unmatched turns inside the current scope.
    pub fn unmatched_in_scope(&self) -> usize {
        self.unmatched_in_scope
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    /// Load diagnostics followed by anything recorded while running.
    pub fn errors(&self) -> &[ParseError] {
        &self.diagnostics
    }

    pub fn has_fatal_errors(&self) -> bool {
        self.diagnostics.iter().any(|e| e.fatal)
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn definitions(&self) -> &Definitions {
        &self.script.definitions
    }

    pub fn options(&self) -> &DialogueOptions {
        &self.options
    }

    /// Compiled pattern for a rule of this engine's script.
    pub fn pattern_for(&self, rule: &Rule) -> Option<Result<&CompiledPattern, &PatternError>> {
        self.compiled.get(rule.order)
    }
}
