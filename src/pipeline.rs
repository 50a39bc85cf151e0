// pipeline.rs: template + page → copy-ready text
//
// expand placeholders → evaluate script into {js} → search/replace.
// Failures never abort: they become inline markers plus diagnostics.

use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::context::PageVars;
use crate::error::{EvalError, PatternError};
use crate::format::{expand, fill_js};
use crate::runner::{evaluate_with, EvaluationContext, Value};
use crate::substitute::substitute_or_mark;
use crate::types::{FormatSpec, PageContext};

/// A recovered failure, reported next to the output.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    Script(EvalError),
    Pattern(PatternError),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Script(e) => write!(f, "script: {}", e),
            Diagnostic::Pattern(e) => write!(f, "search pattern: {}", e),
        }
    }
}

/// Output of one formatting run.
#[derive(Debug, Clone, PartialEq)]
pub struct Formatted {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl Formatted {
    pub fn plain(text: String) -> Self {
        Formatted { text, diagnostics: Vec::new() }
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Runs format specs against pages with a fixed engine configuration.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: EngineConfig,
}

impl Formatter {
    pub fn new(config: EngineConfig) -> Self {
        Formatter { config }
    }

    pub fn format(&self, spec: &FormatSpec, page: &PageContext) -> Formatted {
        let vars = PageVars::from_page(page);
        let mut text = expand(&spec.template, &vars);
        let mut diagnostics = Vec::new();

        if spec.has_script() {
            let js = match self.run_script(&spec.script_source, &vars) {
                Ok(value) => value.to_string(),
                Err(e) => {
                    let marker = e.marker();
                    diagnostics.push(Diagnostic::Script(e));
                    marker
                }
            };
            text = fill_js(&text, &js);
        }

        if spec.has_search() {
            let (out, err) = substitute_or_mark(&text, &spec.search_pattern, &spec.replace_pattern);
            if let Some(e) = err {
                diagnostics.push(Diagnostic::Pattern(e));
            }
            text = out;
        }

        Formatted { text, diagnostics }
    }

    /// Evaluate a script against page values, bounded by the configured timeout.
    pub fn run_script(&self, source: &str, vars: &PageVars) -> Result<Value, EvalError> {
        let config = self.config.clone();
        let source = source.to_string();
        let vars = vars.clone();
        let job = move || {
            let ctx = EvaluationContext::for_page(&vars);
            evaluate_with(&source, &ctx, &config)
        };
        match self.config.eval_timeout() {
            Some(limit) => race(limit, job),
            None => job(),
        }
    }
}

/// Run `job` on a worker thread and wait at most `limit` for its result.
/// A late result is dropped; the worker is left to finish on its own.
pub(crate) fn race<F>(limit: Duration, job: F) -> Result<Value, EvalError>
where
    F: FnOnce() -> Result<Value, EvalError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("copytab-eval".into())
        .spawn(move || {
            // receiver may already be gone after a timeout
            let _ = tx.send(job());
        });
    if let Err(e) = spawned {
        return Err(EvalError::eval(format!("could not start evaluator: {}", e)));
    }
    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(limit_ms = limit.as_millis() as u64, "script evaluation timed out");
            Err(EvalError::Timeout(limit))
        }
        Err(RecvTimeoutError::Disconnected) => Err(EvalError::eval("evaluator stopped without a result")),
    }
}

/// Format `page` with `spec` using the default engine configuration.
pub fn format_page(spec: &FormatSpec, page: &PageContext) -> String {
    Formatter::default().format(spec, page).text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec(template: &str, search: &str, replace: &str, script: &str) -> FormatSpec {
        FormatSpec {
            id: "1".into(),
            name: "test".into(),
            template: template.into(),
            search_pattern: search.into(),
            replace_pattern: replace.into(),
            script_source: script.into(),
        }
    }

    #[test]
    fn test_title_and_domain() {
        let page = PageContext::new("Example", "https://example.com/a");
        assert_eq!(format_page(&spec("{title} ({domain})", "", "", ""), &page), "Example (example.com)");
    }

    #[test]
    fn test_invalid_url_gives_empty_domain_and_path() {
        let page = PageContext::new("T", "not a url");
        assert_eq!(format_page(&spec("[{domain}|{path}]", "", "", ""), &page), "[|]");
    }

    #[test]
    fn test_script_fills_every_js() {
        let page = PageContext::new("Hello World", "https://example.com/");
        let out = format_page(&spec("{js} / {js}", "", "", "title.substring(0,5)"), &page);
        assert_eq!(out, "Hello / Hello");
    }

    #[test]
    fn test_empty_script_leaves_js_token() {
        let page = PageContext::new("T", "https://example.com/");
        assert_eq!(format_page(&spec("{title} {js}", "", "", "  "), &page), "T {js}");
    }

    #[test]
    fn test_script_error_is_inline() {
        let page = PageContext::new("T", "https://example.com/");
        let out = Formatter::default().format(&spec("{title}: {js}", "", "", "fetch(url)"), &page);
        assert_eq!(out.text, "T: [error: security violation: 'fetch(' is not allowed]");
        assert!(matches!(out.diagnostics.as_slice(), [Diagnostic::Script(EvalError::SecurityViolation(_))]));
    }

    #[test]
    fn test_substitution_runs_after_script() {
        let page = PageContext::new("Rust Docs - Rust", "https://doc.rust-lang.org/std/");
        let out = format_page(&spec("{js}", " - Rust", "", "title"), &page);
        assert_eq!(out, "Rust Docs");
    }

    #[test]
    fn test_regex_substitution_over_expanded_text() {
        let page = PageContext::new("Issue #42 · owner/repo", "https://github.com/owner/repo/issues/42");
        let out = format_page(&spec("{title}", r"/^Issue #(\d+) · (.+)$/", "$2#$1", ""), &page);
        // flagless slash pattern stays literal
        assert_eq!(out, "Issue #42 · owner/repo");
        let out = format_page(&spec("{title}", r"/^Issue #(\d+) · (.+)$/u", "$2#$1", ""), &page);
        assert_eq!(out, "owner/repo#42");
    }

    #[test]
    fn test_bad_pattern_marks_output() {
        let page = PageContext::new("T", "https://example.com/");
        let out = Formatter::default().format(&spec("{title}", "/[/g", "x", ""), &page);
        assert!(out.text.starts_with("T [pattern error: "), "{}", out.text);
        assert!(matches!(out.diagnostics.as_slice(), [Diagnostic::Pattern(_)]));
    }

    #[test]
    fn test_deterministic() {
        let page = PageContext::new("Hello", "https://example.com/x");
        let s = spec("{title}|{js}", "/l/g", "L", "if (title.length > 3) ? upper(domain) : path");
        let first = Formatter::default().format(&s, &page);
        let second = Formatter::default().format(&s, &page);
        assert_eq!(first, second);
        assert_eq!(first.text, "HeLLo|EXAMPLE.COM");
        assert!(first.is_clean());
    }

    #[test]
    fn test_race_times_out() {
        let result = race(Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            Ok(Value::str("late"))
        });
        assert_eq!(result, Err(EvalError::Timeout(Duration::from_millis(20))));
        assert_eq!(
            EvalError::Timeout(Duration::from_millis(20)).marker(),
            "[error: evaluation timed out after 20ms]"
        );
    }

    #[test]
    fn test_race_returns_result() {
        assert_eq!(race(Duration::from_secs(5), || Ok(Value::Num(7.0))), Ok(Value::Num(7.0)));
    }

    #[test]
    fn test_race_worker_panic() {
        let result = race(Duration::from_secs(5), || panic!("boom"));
        assert!(matches!(result, Err(EvalError::Evaluation(_))));
    }

    #[test]
    fn test_inline_evaluation_without_timeout() {
        let formatter = Formatter::new(EngineConfig { eval_timeout_ms: 0, ..EngineConfig::default() });
        let page = PageContext::new("T", "https://example.com/");
        assert_eq!(formatter.format(&spec("{js}", "", "", "1 + 2 * 3"), &page).text, "7");
    }
}
