//! Text helpers used when logging and rendering contributions.

/// Truncate to at most `max_len` bytes, ending with `...` when shortened.
///
/// Never splits a UTF-8 character.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3).min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Collapse whitespace runs (including newlines) into single spaces and truncate.
///
/// Used for one-line previews of contribution text in logs.
pub fn preview(s: &str, max_len: usize) -> String {
    let flat = s.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&flat, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("a longer sentence", 9), "a long...");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        // "é" is two bytes; cutting at byte 3 would split the second one
        assert_eq!(truncate("éééé", 6), "é...");
    }

    #[test]
    fn preview_flattens_newlines() {
        assert_eq!(preview("line one\n\n  line two", 100), "line one line two");
        assert_eq!(preview("alpha\nbeta gamma", 10), "alpha b...");
    }
}
