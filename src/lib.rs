//! A rule-script dialogue engine and action runner for a conversational robot.
//!
//! Two subsystems live here:
//!
//! - the **dialogue engine** ([`DialogueEngine`]): loads a line-oriented rule
//!   script into a tree of nested rules, matches normalized input against it
//!   with scope preference, and renders randomized output that may carry
//!   `<action>` tokens;
//! - the **action runner** ([`ActionRunner`]): a single worker thread that
//!   executes action-token batches on a [`Hardware`] collaborator under a
//!   per-action deadline and cooperative cancellation.
//!
//! [`Session`] wires the two together for a front end.
//!
//! ```text
//! text ─▶ DialogueEngine::handle_input ─▶ TurnResult { spoken_text, actions }
//!                                                          │
//!                                   ActionRunner::enqueue ◀┘ ─▶ Hardware
//! ```

use std::collections::HashMap;
use std::sync::Arc;

#[macro_use]
mod macros;
mod actions;
mod api;
mod engine;
mod error;
mod session;
mod text;

pub use actions::{
    Action, ActionRunner, CancelToken, Hardware, HardwareCall, Outcome, RecordingHardware, RunnerState,
    SimulatedHardware, Wait,
};
pub use api::{DialogueOptions, RunnerOptions, TurnResult};
pub use engine::{CompiledPattern, DialogueEngine, DialogueState, INTERRUPT_WORDS, PatternFeatures, ScopeStack, Script};
pub use error::{ErrorCategory, HardwareError, ParseError, PatternError, ScriptError};
pub use session::{Session, Speaker};
pub use text::{MAX_SPOKEN_CHARS, collapse_whitespace, normalize, sanitize_speech};

// --- Script model ------------------------------------------------------------

/// Deepest `u<level>` a script may declare. Deeper rules are rejected at load.
pub const MAX_RULE_LEVEL: usize = 7;

/// One `u<level>: (pattern) : output` line of a script.
///
/// A rule owns its children; rules are shared read-only through `Arc` so the
/// scope stack can hold handles without back-references.
///
/// ```text
/// u:  (hello)       : hi! what is your name?     level 0, order 0
///   u1: (my name is _) : nice to meet you $name  level 1, order 1 (child of 0)
/// u:  (bye)         : goodbye                    level 0, order 2
/// ```
#[derive(Debug)]
pub struct Rule {
    /// Nesting depth, 0 for top-level rules.
    pub level: usize,
    /// Raw pattern text between the parentheses.
    pub pattern: String,
    /// Raw output template.
    pub output: String,
    /// 1-based line in the script.
    pub line: usize,
    /// Load-time counter in file order; indexes compiled patterns.
    pub order: usize,
    pub children: Vec<Arc<Rule>>,
}

/// Named choice lists declared with `~name: [a b "c d"]`.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    entries: HashMap<String, Vec<String>>,
}

impl Definitions {
    /// Alternatives for `name`, in declaration order.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Insert or replace a definition.
    pub(crate) fn insert(&mut self, name: impl Into<String>, items: Vec<String>) {
        self.entries.insert(name.into(), items);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Definition names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<N: Into<String>> FromIterator<(N, Vec<String>)> for Definitions {
    fn from_iter<T: IntoIterator<Item = (N, Vec<String>)>>(iter: T) -> Self {
        let mut defs = Definitions::default();
        for (name, items) in iter {
            defs.insert(name, items);
        }
        defs
    }
}
