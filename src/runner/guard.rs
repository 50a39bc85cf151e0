//! Static validation of script source before anything is evaluated.
//!
//! A script is rejected when it mentions a denied identifier anywhere (as a
//! whole word) or contains a call-shaped use of a dangerous primitive.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::EvalError;

/// Identifiers rejected wherever they appear as a whole word.
pub const DENIED_WORDS: &[&str] = &[
    // code execution
    "eval",
    "Function",
    "importScripts",
    "require",
    // network
    "XMLHttpRequest",
    "WebSocket",
    "EventSource",
    // storage
    "localStorage",
    "sessionStorage",
    "indexedDB",
    // DOM and global environment
    "document",
    "window",
    "globalThis",
    "chrome",
    "navigator",
    "constructor",
    "__proto__",
    "prototype",
    // debugging
    "debugger",
];

/// Call-shaped patterns, with the description used in the error.
const DENIED_CALLS: &[(&str, &str)] = &[
    (r"\beval\s*\(", "eval("),
    (r"\bFunction\s*\(", "Function("),
    (r"\bsetTimeout\s*\(", "setTimeout("),
    (r"\bsetInterval\s*\(", "setInterval("),
    (r"\bsetImmediate\s*\(", "setImmediate("),
    (r"\brequestAnimationFrame\s*\(", "requestAnimationFrame("),
    (r"\bfetch\s*\(", "fetch("),
    (r"\bimport\s*\(", "import("),
    (r"\balert\s*\(", "alert("),
    (r"\bconfirm\s*\(", "confirm("),
    (r"\bprompt\s*\(", "prompt("),
    (r"\bconsole\s*\.", "console."),
    (r"\bnew\s+[A-Za-z_$]", "new"),
];

// Built from the constant tables above; every entry is a valid pattern.
#[allow(clippy::expect_used)]
static DENIED_CALL_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    DENIED_CALLS
        .iter()
        .map(|(pat, desc)| (Regex::new(pat).expect("constant regex pattern is valid"), *desc))
        .collect()
});

#[allow(clippy::expect_used)]
static WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").expect("constant regex pattern is valid")
});

/// Reject `source` if it uses a denied construct. `extra` adds words on
/// top of [`DENIED_WORDS`].
pub fn check_source(source: &str, extra: &[String]) -> Result<(), EvalError> {
    for (re, desc) in DENIED_CALL_PATTERNS.iter() {
        if re.is_match(source) {
            return Err(EvalError::SecurityViolation(format!("'{}' is not allowed", desc)));
        }
    }
    for word in WORD.find_iter(source) {
        let w = word.as_str();
        if DENIED_WORDS.contains(&w) || extra.iter().any(|e| e == w) {
            return Err(EvalError::SecurityViolation(format!("'{}' is not allowed", w)));
        }
    }
    Ok(())
}
