//! End-to-end checks through the public API: settings on disk, the preset
//! registry and the format pipeline.

use copytab::config::{JsonFileStore, SettingsStore, SETTINGS_KEY};
use copytab::presets::{PresetRegistry, BUILTIN_IDS};
use copytab::{
    evaluate, expand, format_page, substitute, EngineConfig, EvalError, EvaluationContext, FormatSpec, Formatter,
    PageContext, Settings, Value,
};
use pretty_assertions::assert_eq;

fn custom(template: &str, search: &str, replace: &str, script: &str) -> FormatSpec {
    FormatSpec {
        id: "1700000000000".into(),
        name: "custom".into(),
        template: template.into(),
        search_pattern: search.into(),
        replace_pattern: replace.into(),
        script_source: script.into(),
    }
}

#[test]
fn expansion_basics() {
    let page = PageContext::new("T", "U");
    let vars = copytab::context::PageVars::from_page(&page);
    assert_eq!(expand("{title} - {url}", &vars), "T - U");
    assert_eq!(expand("no placeholders {here}", &vars), "no placeholders {here}");
}

#[test]
fn substitution_literal_and_regex() {
    assert_eq!(substitute("aXbXc", "X", "-").unwrap(), "a-b-c");
    assert_eq!(substitute("2024-01-02", r"/(\d+)-(\d+)-(\d+)/", "$3/$2/$1").unwrap(), "2024-01-02");
    assert_eq!(substitute("2024-01-02", r"/(\d+)-(\d+)-(\d+)/g", "$3/$2/$1").unwrap(), "02/01/2024");
}

#[test]
fn evaluator_properties() {
    let ctx = EvaluationContext::from([("title", "Hello")]);
    assert_eq!(evaluate("substring(title, 0, 3)", &ctx), Ok(Value::str("substring(title, 0, 3)")));
    assert_eq!(evaluate("title.substring(0,3)", &ctx), Ok(Value::str("Hel")));
    assert!(matches!(evaluate("fetch(url)", &ctx), Err(EvalError::SecurityViolation(_))));
    assert_eq!(evaluate("1 + 2 * 3", &ctx), Ok(Value::Num(7.0)));
}

#[test]
fn github_issue_reference() {
    let page = PageContext::new(
        "Fix parser panic · Issue #123 · rust-lang/regex",
        "https://github.com/rust-lang/regex/issues/123",
    );
    let spec = custom(
        "{js}: {title}",
        r"/ · Issue #\d+ · .+$/u",
        "",
        "if (domain.includes('github')) ? concat(split(path, '/').at(1), '/', split(path, '/').at(2), '#', last(split(path, '/'))) : domain",
    );
    let out = Formatter::default().format(&spec, &page);
    assert!(out.is_clean(), "{:?}", out.diagnostics);
    assert_eq!(out.text, "rust-lang/regex#123: Fix parser panic");
}

#[test]
fn format_is_repeatable() {
    let page = PageContext::new("Example", "https://example.com/a");
    let spec = custom("{title} ({domain})", "", "", "");
    let first = format_page(&spec, &page);
    assert_eq!(first, "Example (example.com)");
    assert_eq!(format_page(&spec, &page), first);
}

#[test]
fn settings_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("copytab").join("settings.json");

    let mut store = JsonFileStore::new(&path);
    let mut registry = PresetRegistry::new(Settings::load(&mut store, BUILTIN_IDS));
    assert_eq!(registry.active().len(), BUILTIN_IDS.len());

    registry.add_custom(custom("{title} <{url}>", "", "", "")).unwrap();
    registry.toggle("title-url-space").unwrap();
    registry.settings().save(&mut store).unwrap();

    let raw = JsonFileStore::new(&path).get(SETTINGS_KEY).unwrap().unwrap();
    assert_eq!(raw["customFormats"][0]["template"], "{title} <{url}>");

    let reloaded = PresetRegistry::new(Settings::load(&mut JsonFileStore::new(&path), BUILTIN_IDS));
    let ids: Vec<&str> = reloaded.active().iter().map(|p| p.id()).collect();
    assert_eq!(
        ids,
        ["title-url-newline", "markdown-format", "html-format", "selected-text-format", "1700000000000"]
    );

    let page = PageContext::new("T", "https://e.test/");
    let preset = reloaded.get("1700000000000").unwrap();
    assert_eq!(reloaded.apply(preset, &page, &EngineConfig::default()).text, "T <https://e.test/>");
}

#[test]
fn engine_config_from_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"presetSettings": {"engine": {"extraDeniedWords": ["path"]}}}"#).unwrap();

    let settings = Settings::load(&mut JsonFileStore::new(&path), BUILTIN_IDS);
    assert_eq!(settings.engine.extra_denied_words, vec!["path".to_string()]);
    assert_eq!(settings.engine.eval_timeout_ms, 1000);

    let page = PageContext::new("T", "https://e.test/p");
    let out = Formatter::new(settings.engine).format(&custom("{js}", "", "", "upper(path)"), &page);
    assert_eq!(out.text, "[error: security violation: 'path' is not allowed]");
}
