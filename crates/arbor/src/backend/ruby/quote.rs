//! Ruby literal syntax

/// Quote `text` as a double-quoted Ruby string literal.
///
/// Backslash, quote and the interpolation openers `#{`, `#$` and `#@` are
/// escaped, and every C0 control character gets its own escape, so the
/// literal stays on one line and reads back as exactly `text`.
#[must_use]
pub fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => quoted.push_str(r"\\"),
            '"' => quoted.push_str("\\\""),
            '#' if matches!(chars.peek(), Some('{' | '$' | '@')) => quoted.push_str(r"\#"),
            '\x07' => quoted.push_str(r"\a"),
            '\x08' => quoted.push_str(r"\b"),
            '\t' => quoted.push_str(r"\t"),
            '\n' => quoted.push_str(r"\n"),
            '\x0b' => quoted.push_str(r"\v"),
            '\x0c' => quoted.push_str(r"\f"),
            '\r' => quoted.push_str(r"\r"),
            '\x1b' => quoted.push_str(r"\e"),
            c if c.is_ascii_control() && c != '\x7f' => {
                quoted.push_str(&format!("\\x{:02X}", c as u32));
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Ruby regex literal anchored at the start of the string.
#[must_use]
pub fn regex_literal(pattern: &str) -> String {
    let mut literal = String::with_capacity(pattern.len() + 4);
    literal.push_str(r"/\A");
    let mut escaped = false;
    for c in pattern.chars() {
        if c == '/' && !escaped {
            literal.push('\\');
        }
        escaped = c == '\\' && !escaped;
        literal.push(c);
    }
    literal.push('/');
    literal
}
