//! Small text helpers shared by tools and console output.

/// Cut `s` to at most `max_bytes` bytes without splitting a code point.
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut cutoff = max_bytes;
    while cutoff > 0 && !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    &s[..cutoff]
}

/// Render a value for display, limited to `max_chars` characters with a
/// trailing `...` when cut. Strings are shown raw, everything else as
/// pretty JSON.
pub fn truncate_display(value: &serde_json::Value, max_chars: usize) -> String {
    let rendered = match value {
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    truncate_chars(&rendered, max_chars)
}

/// Limit `s` to `max_chars` characters, appending `...` when cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Trim each line and drop empty ones.
pub fn trim_lines(s: &str) -> String {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
