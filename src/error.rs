//! Error and diagnostic types.
//!
//! Three kinds of failure flow through the crate:
//!
//! ```text
//! script load ── ParseError (diagnostic record, fatal or not)
//!   └─ pattern compile ── PatternError (folded into a ParseError at match time)
//! action run ── HardwareError (logged, followed by a stop)
//! ```
//!
//! `ParseError` is data, not control flow: the loader keeps going after one
//! and the dialogue engine keeps the full list for inspection.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Why a rule pattern (or a choice group inside a pattern/output) could not be compiled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("unclosed [ in pattern")]
    UnclosedBracket,

    #[error("unexpected ] in pattern")]
    StrayClosingBracket,

    #[error("unclosed quote in choice")]
    UnclosedQuote,

    #[error("undefined definition ~{0}")]
    UndefinedDefinition(String),

    #[error("empty choice in pattern")]
    EmptyChoice,

    #[error("choice only had empty options after normalization")]
    EmptyChoiceAfterNormalization,

    #[error("definition ~{0} had no usable options")]
    EmptyDefinition(String),

    #[error("empty pattern after normalization")]
    EmptyPattern,

    #[error("regex compile error: {0}")]
    Regex(#[from] regex::Error),

    #[error("rule was not reached while compiling the script")]
    NotCompiled,
}

/// Failure reported by a hardware collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareError {
    /// The driver accepted the call but the write to the device failed.
    #[error("hardware write failed: {0}")]
    Write(String),

    /// The device is not connected or was closed.
    #[error("hardware unavailable: {0}")]
    Unavailable(String),

    /// A driver call unwound instead of returning.
    #[error("hardware call panicked: {0}")]
    Panicked(String),
}

/// Failure to obtain script text at all.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Classification of a [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Definition,
    Syntax,
    Nesting,
    Pattern,
    Output,
    Fatal,
    DepthGuard,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Definition => "definition",
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Nesting => "nesting",
            ErrorCategory::Pattern => "pattern",
            ErrorCategory::Output => "output",
            ErrorCategory::Fatal => "fatal",
            ErrorCategory::DepthGuard => "depth_guard",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diagnostic produced while loading or running a script.
///
/// `line` is 1-based; line 0 is used for whole-file problems such as a script
/// with no top-level rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub category: ErrorCategory,
    pub message: String,
    pub fatal: bool,
}

impl ParseError {
    pub(crate) fn non_fatal(file: &str, line: usize, category: ErrorCategory, message: impl Into<String>) -> Self {
        ParseError { file: file.to_string(), line, category, message: message.into(), fatal: false }
    }

    pub(crate) fn fatal(file: &str, line: usize, message: impl Into<String>) -> Self {
        ParseError { file: file.to_string(), line, category: ErrorCategory::Fatal, message: message.into(), fatal: true }
    }

    pub fn severity(&self) -> &'static str {
        if self.fatal { "FATAL" } else { "NON-FATAL" }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} [{}] [{}] {}", self.file, self.line, self.category, self.severity(), self.message)
    }
}

impl std::error::Error for ParseError {}
