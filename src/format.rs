// format.rs: placeholder expansion for copy formats
//
// Supports: {title}, {url}, {domain}, {path}, {selectedText}.
// {js} is left in place here and filled by the pipeline once the
// script has been evaluated. Unknown tokens pass through untouched.

use crate::context::PageVars;

/// Token replaced with the evaluator result.
pub const JS_TOKEN: &str = "{js}";

/// Expand `{name}` placeholders in a single left-to-right pass.
/// Inserted values are never re-scanned.
pub fn expand(template: &str, vars: &PageVars) -> String {
    let mut result = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        if let Some(close) = find_placeholder_end(after) {
            if let Some(value) = vars.get(&after[..close]) {
                result.push_str(value);
                rest = &after[close + 1..];
                continue;
            }
        }
        // Not a known placeholder: keep the brace and rescan from the next char
        result.push('{');
        rest = after;
    }
    result.push_str(rest);
    result
}

/// Position of the `}` closing a placeholder name, if the text up to it
/// is a plausible identifier.
fn find_placeholder_end(s: &str) -> Option<usize> {
    let close = s.find('}')?;
    let name = &s[..close];
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        Some(close)
    } else {
        None
    }
}

/// Replace every `{js}` occurrence with `value`.
pub fn fill_js(text: &str, value: &str) -> String {
    text.replace(JS_TOKEN, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(title: &str, url: &str) -> PageVars {
        PageVars::from_page(&crate::types::PageContext::new(title, url))
    }

    #[test]
    fn test_title_and_url() {
        assert_eq!(expand("{title} - {url}", &vars("T", "U")), "T - U");
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        let v = vars("T", "https://example.com/");
        for t in ["", "plain text", "{ title }", "{}", "a { b } c", "日本語のテキスト", "{unclosed"] {
            assert_eq!(expand(t, &v), t);
        }
    }

    #[test]
    fn test_unknown_tokens_kept() {
        assert_eq!(expand("{foo} {title} {js}", &vars("T", "U")), "{foo} T {js}");
    }

    #[test]
    fn test_every_occurrence_replaced() {
        assert_eq!(expand("{title}{title}|{title}", &vars("ab", "U")), "abab|ab");
    }

    #[test]
    fn test_domain_and_path() {
        let v = vars("Example", "https://example.com/a/b");
        assert_eq!(expand("{domain}{path}", &v), "example.com/a/b");
    }

    #[test]
    fn test_values_not_rescanned() {
        let v = vars("{url}", "https://x.test/");
        assert_eq!(expand("{title}", &v), "{url}");
    }

    #[test]
    fn test_nested_brace_before_token() {
        assert_eq!(expand("{{title}}", &vars("T", "U")), "{T}");
    }

    #[test]
    fn test_multibyte_text_preserved() {
        assert_eq!(expand("「{title}」→{domain}", &vars("題名", "https://example.jp/")), "「題名」→example.jp");
    }

    #[test]
    fn test_fill_js() {
        assert_eq!(fill_js("{js}-{js}", "7"), "7-7");
        assert_eq!(fill_js("{title}", "7"), "{title}");
    }
}
