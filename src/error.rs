//! Error types for pattern substitution, evaluation, settings and presets.

use std::time::Duration;

use thiserror::Error;

/// A malformed search pattern.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternError {
    #[error("duplicate flag '{0}'")]
    DuplicateFlag(char),

    #[error("invalid pattern /{pattern}/: {reason}")]
    Compile { pattern: String, reason: String },
}

impl PatternError {
    pub(crate) fn compile(pattern: &str, err: &regex::Error) -> Self {
        PatternError::Compile { pattern: pattern.to_string(), reason: regex_reason(err) }
    }
}

/// Regex syntax errors span several lines (pattern, caret, message);
/// keep only the message so the inline marker stays on one line.
fn regex_reason(err: &regex::Error) -> String {
    let text = err.to_string();
    text.lines()
        .find_map(|l| l.trim().strip_prefix("error: ").map(str::to_string))
        .or_else(|| text.lines().next().map(|l| l.trim().to_string()))
        .unwrap_or_default()
}

/// Failures of the restricted evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("security violation: {0}")]
    SecurityViolation(String),

    #[error("{0}")]
    Evaluation(String),

    #[error("evaluation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl EvalError {
    pub(crate) fn eval(msg: impl Into<String>) -> Self {
        EvalError::Evaluation(msg.into())
    }

    /// Inline marker substituted for `{js}` when evaluation fails.
    pub fn marker(&self) -> String {
        format!("[error: {}]", self)
    }
}

/// Settings store failures.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Preset registration and lookup failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PresetError {
    #[error("preset is missing its {0}")]
    MissingField(&'static str),

    #[error("a preset with id '{0}' already exists")]
    DuplicateId(String),

    #[error("preset script rejected: {0}")]
    Rejected(EvalError),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("built-in preset '{0}' cannot be removed")]
    BuiltinPreset(String),
}

/// Command-line usage mistakes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UsageError {
    #[error("missing command")]
    MissingCommand,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("option '{0}' needs a value")]
    MissingValue(String),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("unexpected argument '{0}'")]
    Unexpected(String),
}
