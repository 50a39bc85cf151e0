// substitute.rs: search/replace applied after placeholder and script expansion
//
// Search syntax: `/body/flags` (flags from g,i,m,s,u,y, at least one) is a
// regex; anything else is a literal matched everywhere. A pattern written
// as `/body/` with no flags is taken literally.
//
// Replacement tokens: $$, $&, $`, $', $n, $nn, $<name>.

use std::sync::LazyLock;

use regex::{Captures, Regex, RegexBuilder};

use crate::error::PatternError;

// Shape of a `/body/flags` search pattern; constant and known to compile.
#[allow(clippy::expect_used)]
static SLASH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^/(.+)/([gimsuy]+)$").expect("constant regex pattern is valid")
});

/// A parsed search pattern.
#[derive(Debug, Clone)]
pub enum SubstitutionRule {
    /// `/body/flags`
    Pattern { regex: Regex, global: bool, sticky: bool },
    /// Anything else, escaped and applied globally.
    Literal { regex: Regex },
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Flags {
    global: bool,
    case_insensitive: bool,
    multi_line: bool,
    dot_all: bool,
    sticky: bool,
}

fn parse_flags(spec: &str) -> Result<Flags, PatternError> {
    let mut flags = Flags::default();
    // accepted for compatibility; matching is always Unicode-aware
    let mut unicode = false;
    for ch in spec.chars() {
        let slot = match ch {
            'g' => &mut flags.global,
            'i' => &mut flags.case_insensitive,
            'm' => &mut flags.multi_line,
            's' => &mut flags.dot_all,
            'u' => &mut unicode,
            'y' => &mut flags.sticky,
            _ => continue,
        };
        if *slot {
            return Err(PatternError::DuplicateFlag(ch));
        }
        *slot = true;
    }
    Ok(flags)
}

impl SubstitutionRule {
    /// Parse a search pattern. Patterns are compiled fresh on every call.
    pub fn parse(search: &str) -> Result<Self, PatternError> {
        if let Some(caps) = SLASH_PATTERN.captures(search) {
            let body = &caps[1];
            let flags = parse_flags(&caps[2])?;
            let regex = RegexBuilder::new(body)
                .case_insensitive(flags.case_insensitive)
                .multi_line(flags.multi_line)
                .dot_matches_new_line(flags.dot_all)
                .build()
                .map_err(|e| PatternError::compile(body, &e))?;
            return Ok(SubstitutionRule::Pattern { regex, global: flags.global, sticky: flags.sticky });
        }
        let regex = Regex::new(&regex::escape(search))
            .map_err(|e| PatternError::compile(search, &e))?;
        Ok(SubstitutionRule::Literal { regex })
    }

    fn regex(&self) -> &Regex {
        match self {
            SubstitutionRule::Pattern { regex, .. } | SubstitutionRule::Literal { regex } => regex,
        }
    }

    fn is_global(&self) -> bool {
        match self {
            SubstitutionRule::Pattern { global, .. } => *global,
            SubstitutionRule::Literal { .. } => true,
        }
    }

    fn is_sticky(&self) -> bool {
        matches!(self, SubstitutionRule::Pattern { sticky: true, .. })
    }

    /// Replace matches in `text` with `replacement`.
    pub fn apply(&self, text: &str, replacement: &str) -> String {
        let regex = self.regex();
        let global = self.is_global();
        let sticky = self.is_sticky();
        let has_names = regex.capture_names().any(|n| n.is_some());

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut pos = 0;
        while pos <= text.len() {
            let Some(caps) = regex.captures_at(text, pos) else { break };
            let Some(m) = caps.get(0) else { break };
            if sticky && m.start() != pos {
                break;
            }
            out.push_str(&text[last..m.start()]);
            expand_replacement(&mut out, replacement, &caps, text, has_names);
            last = m.end();
            if !global {
                break;
            }
            pos = if m.start() == m.end() { next_boundary(text, m.end()) } else { m.end() };
        }
        out.push_str(&text[last..]);
        out
    }
}

/// Byte index just past the char starting at `i` (or past the end).
fn next_boundary(text: &str, i: usize) -> usize {
    text[i..].chars().next().map_or(i + 1, |c| i + c.len_utf8())
}

/// Expand replacement tokens for one match.
fn expand_replacement(out: &mut String, replacement: &str, caps: &Captures, text: &str, has_names: bool) {
    let group_count = caps.len() - 1;
    let bytes = replacement.as_bytes();
    let len = bytes.len();
    let mut lit_start = 0;
    let mut i = 0;
    while i < len {
        if bytes[i] != b'$' || i + 1 >= len {
            i += 1;
            continue;
        }
        let (consumed, piece): (usize, Option<&str>) = match bytes[i + 1] {
            b'$' => (2, Some("$")),
            b'&' => (2, Some(caps.get(0).map_or("", |m| m.as_str()))),
            b'`' => (2, Some(caps.get(0).map_or("", |m| &text[..m.start()]))),
            b'\'' => (2, Some(caps.get(0).map_or("", |m| &text[m.end()..]))),
            b'0'..=b'9' => match group_reference(&bytes[i + 1..], group_count) {
                Some((digits, idx)) => (1 + digits, Some(caps.get(idx).map_or("", |m| m.as_str()))),
                None => (0, None),
            },
            b'<' if has_names => match replacement[i + 2..].find('>') {
                Some(end) => {
                    let name = &replacement[i + 2..i + 2 + end];
                    (3 + end, Some(caps.name(name).map_or("", |m| m.as_str())))
                }
                None => (0, None),
            },
            _ => (0, None),
        };
        match piece {
            Some(p) => {
                out.push_str(&replacement[lit_start..i]);
                out.push_str(p);
                i += consumed;
                lit_start = i;
            }
            None => i += 1,
        }
    }
    out.push_str(&replacement[lit_start..]);
}

/// Resolve `$n` / `$nn`: prefer the two-digit group when it exists.
/// Returns (digits consumed, group index).
fn group_reference(digits: &[u8], group_count: usize) -> Option<(usize, usize)> {
    let d1 = (digits[0] - b'0') as usize;
    if let Some(&b) = digits.get(1) {
        if b.is_ascii_digit() {
            let nn = d1 * 10 + (b - b'0') as usize;
            if nn >= 1 && nn <= group_count {
                return Some((2, nn));
            }
        }
    }
    if d1 >= 1 && d1 <= group_count {
        return Some((1, d1));
    }
    None
}

/// Apply `search`/`replace` to `text`. Blank searches are a no-op.
pub fn substitute(text: &str, search: &str, replace: &str) -> Result<String, PatternError> {
    if search.trim().is_empty() {
        return Ok(text.to_string());
    }
    let rule = SubstitutionRule::parse(search)?;
    Ok(rule.apply(text, replace))
}

/// Like [`substitute`], but never fails: on a bad pattern the text is
/// returned unchanged with an inline marker appended, and the error is
/// handed back for the caller to surface.
pub fn substitute_or_mark(text: &str, search: &str, replace: &str) -> (String, Option<PatternError>) {
    match substitute(text, search, replace) {
        Ok(s) => (s, None),
        Err(e) => {
            tracing::warn!(pattern = search, error = %e, "search pattern rejected");
            (format!("{} [pattern error: {}]", text, e), Some(e))
        }
    }
}
