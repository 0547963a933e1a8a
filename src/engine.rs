//! Dialogue engine.
//!
//! This module is the entry point for the rule-script side of the crate. It is
//! split into focused submodules under `src/engine/`.
//!
//! ## How the parts work together
//!
//! ```text
//! script text ── Script::parse                    (script.rs)
//!                  - definitions, rule tree, load diagnostics
//!                          │
//!                          v
//!                CompiledRules::new               (compiled_rules.rs)
//!                  - CompiledPattern per rule     (pattern.rs)
//!                          │
//! input ── DialogueEngine::handle_input           (dialogue.rs)
//!            - normalize, interrupt words
//!            - scoped children, then top level
//!            - ScopeStack update                  (scope.rs)
//!            - Renderer: choices, ~defs, $vars    (render.rs)
//!                          │
//!                          v
//!                 TurnResult { spoken_text, actions }
//! ```
//!
//! ## Responsibilities by module
//!
//! - `script.rs`: line grammar, definition table, nested rule tree, load errors.
//! - `pattern.rs`: pattern language -> anchored regex + capture slots.
//! - `compiled_rules.rs`: compiled pattern per rule, indexed by load order.
//! - `scope.rs`: the truncate-then-push scope stack.
//! - `render.rs`: output template expansion and action token extraction.
//! - `dialogue.rs`: the per-turn state machine.

#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/dialogue.rs"]
mod dialogue;
#[path = "engine/pattern.rs"]
mod pattern;
#[path = "engine/render.rs"]
mod render;
#[path = "engine/scope.rs"]
mod scope;
#[path = "engine/script.rs"]
mod script;


pub use dialogue::{DialogueEngine, DialogueState, INTERRUPT_WORDS};
pub use pattern::{CompiledPattern, PatternFeatures};
pub use scope::ScopeStack;
pub use script::Script;
