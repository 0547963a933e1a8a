use crate::engine::DialogueState;
use serde::Serialize;
use std::time::Duration;

/// Options for a [`DialogueEngine`](crate::DialogueEngine).
///
/// The defaults are the values the rule language is written against; scripts
/// rarely need anything else.
#[derive(Debug, Clone)]
pub struct DialogueOptions {
    /// Deepest scope stack a match may create. A match that would push the
    /// stack past this is refused and the conversation resets.
    pub max_depth: usize,
    /// Consecutive unmatched inputs inside a scope before resetting to idle.
    pub unmatched_reset_threshold: usize,
    /// Seed for output randomization; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Rendered in place of an unbound `$variable`.
    pub unknown_variable_text: String,
    /// Spoken acknowledgement for an interrupt word.
    pub interrupt_reply: String,
    /// Upper bound on `[...]` expansions per output.
    pub render_iteration_cap: usize,
}

impl Default for DialogueOptions {
    fn default() -> Self {
        Self {
            max_depth: 6,
            unmatched_reset_threshold: 4,
            seed: None,
            unknown_variable_text: "I don't know".to_string(),
            interrupt_reply: "Stopping now.".to_string(),
            render_iteration_cap: 20,
        }
    }
}

impl DialogueOptions {
    /// Default options with a fixed seed, for reproducible output.
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed), ..Self::default() }
    }
}

/// Options for an [`ActionRunner`](crate::ActionRunner).
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// How often cancellable waits re-check the cancel flag and deadline.
    pub poll_interval: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(30) }
    }
}

impl RunnerOptions {
    /// Defaults, overridden by `PARLEY_POLL_MS` when set to a positive integer.
    pub fn from_env() -> Self {
        let poll_interval = std::env::var("PARLEY_POLL_MS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
            .unwrap_or_else(|| Self::default().poll_interval);
        Self { poll_interval }
    }
}

/// Outcome of one dialogue turn.
///
/// `ok == false` only when the script is unusable (engine in `BOOT`); a turn
/// that simply found no rule is `ok: true, matched: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnResult {
    pub ok: bool,
    pub matched: bool,
    pub state: DialogueState,
    pub spoken_text: String,
    pub actions: Vec<String>,
    pub interrupt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TurnResult {
    pub(crate) fn failure(state: DialogueState, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            matched: false,
            state,
            spoken_text: String::new(),
            actions: Vec::new(),
            interrupt: false,
            error: Some(error.into()),
        }
    }

    pub(crate) fn no_match(state: DialogueState) -> Self {
        Self {
            ok: true,
            matched: false,
            state,
            spoken_text: String::new(),
            actions: Vec::new(),
            interrupt: false,
            error: None,
        }
    }

    pub(crate) fn interrupted(state: DialogueState, reply: &str) -> Self {
        Self { matched: true, spoken_text: reply.to_string(), interrupt: true, ..Self::no_match(state) }
    }

    pub(crate) fn matched(state: DialogueState, spoken_text: String, actions: Vec<String>) -> Self {
        Self { matched: true, spoken_text, actions, ..Self::no_match(state) }
    }
}
