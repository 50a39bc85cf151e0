// Scanning helpers shared by the evaluator grammar. All of them skip over
// quoted strings ('...' or "...", with backslash escapes) so delimiters
// inside literals never count.

/// Walks `s` byte by byte, reporting bytes that are outside string literals.
fn for_each_unquoted(s: &str, mut f: impl FnMut(usize, u8) -> bool) {
    let bytes = s.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' { i += 2; continue; }
                if b == q { quote = None; }
            }
            None => {
                if b == b'\'' || b == b'"' {
                    quote = Some(b);
                } else if !f(i, b) {
                    return;
                }
            }
        }
        i += 1;
    }
}

/// Index of the `)` matching the `(` at `open`.
pub fn find_matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut found = None;
    let tail = s.get(open..)?;
    for_each_unquoted(tail, |i, b| {
        if b == b'(' {
            depth += 1;
        } else if b == b')' {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                found = Some(open + i);
                return false;
            }
        }
        true
    });
    found
}

/// Split at `delim` occurring at paren depth 0 and outside quotes.
pub fn split_top_level(s: &str, delim: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    for_each_unquoted(s, |i, b| {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            _ if b == delim && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        true
    });
    parts.push(&s[start..]);
    parts
}

/// First `delim` at depth 0 outside quotes.
pub fn find_top_level(s: &str, delim: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut found = None;
    for_each_unquoted(s, |i, b| {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            _ if b == delim && depth == 0 => {
                found = Some(i);
                return false;
            }
            _ => {}
        }
        true
    });
    found
}

/// The `:` that closes the branch opened by a ternary `?`: top-level `?`s
/// seen first belong to nested ternaries and each consume one `:`.
pub fn find_branch_colon(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut pending = 0usize;
    let mut found = None;
    for_each_unquoted(s, |i, b| {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b'?' if depth == 0 => pending += 1,
            b':' if depth == 0 => {
                if pending == 0 {
                    found = Some(i);
                    return false;
                }
                pending -= 1;
            }
            _ => {}
        }
        true
    });
    found
}

/// For `s` ending in `)`, the index of the `(` that opens that final group.
pub fn trailing_group_open(s: &str) -> Option<usize> {
    if !s.ends_with(')') {
        return None;
    }
    let last = s.len() - 1;
    let mut stack = Vec::new();
    let mut found = None;
    for_each_unquoted(s, |i, b| {
        if b == b'(' {
            stack.push(i);
        } else if b == b')' {
            let open = stack.pop();
            if i == last {
                found = open;
            }
        }
        true
    });
    found
}

/// Contents of a quoted literal with escapes resolved, or None if `s` is
/// not exactly one literal.
pub fn unquote(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let q = bytes[0];
    if (q != b'\'' && q != b'"') || bytes[bytes.len() - 1] != q {
        return None;
    }
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => return None,
            }
        } else if c as u32 == q as u32 {
            // an unescaped quote ends the literal early
            return None;
        } else {
            out.push(c);
        }
    }
    Some(out)
}

pub fn escape_html(s: &str) -> String {
    s.replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

pub fn escape_markdown_brackets(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == '[' || ch == ']' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_top_level() {
        assert_eq!(split_top_level("a, b(c, d), 'e,f'", b','), vec!["a", " b(c, d)", " 'e,f'"]);
        assert_eq!(split_top_level("", b','), vec![""]);
    }

    #[test]
    fn test_find_matching_paren() {
        let s = "if (a.includes(')')) ? x : y";
        assert_eq!(find_matching_paren(s, 3), Some(19));
        assert_eq!(find_matching_paren("(()", 0), None);
    }

    #[test]
    fn test_find_top_level() {
        assert_eq!(find_top_level("'a:b' : c", b':'), Some(6));
        assert_eq!(find_top_level("f(a:b)", b':'), None);
    }

    #[test]
    fn test_find_branch_colon() {
        assert_eq!(find_branch_colon(" 'a' : 'b'"), Some(5));
        assert_eq!(find_branch_colon(" if (x) ? 'a' : 'b' : 'c'"), Some(20));
        assert_eq!(find_branch_colon(" '?' : 'b'"), Some(5));
        assert_eq!(find_branch_colon(" f(a ? b : c) : d"), Some(14));
        assert_eq!(find_branch_colon(" if (x) ? 'a' : 'b'"), None);
    }

    #[test]
    fn test_trailing_group_open() {
        assert_eq!(trailing_group_open("upper(title.substring(0,3))"), Some(5));
        assert_eq!(trailing_group_open("a.b(c).d(e)"), Some(8));
        assert_eq!(trailing_group_open("abc"), None);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'it\\'s'").as_deref(), Some("it's"));
        assert_eq!(unquote("\"a\\nb\"").as_deref(), Some("a\nb"));
        assert_eq!(unquote("'a' + 'b'"), None);
        assert_eq!(unquote("'"), None);
        assert_eq!(unquote("abc"), None);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(escape_html(r#"<b>"x"</b>"#), "&lt;b&gt;&quot;x&quot;&lt;/b&gt;");
        assert_eq!(escape_markdown_brackets("[a] b"), "\\[a\\] b");
    }
}
