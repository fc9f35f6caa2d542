//! Output bounding for observations.
//!
//! Tool output becomes prompt input on the next turn. Long blocks are cut
//! with an explicit marker so the model knows something was left out.

/// Keep the first `max_lines` lines of `text`, noting how many were dropped.
pub fn truncate_lines(text: &str, max_lines: usize) -> String {
    let total = text.split('\n').count();
    if text.is_empty() || total <= max_lines {
        return text.to_string();
    }
    let kept: Vec<&str> = text.split('\n').take(max_lines).collect();
    format!(
        "{}\n\n[... {} more lines truncated ...]",
        kept.join("\n"),
        total - max_lines
    )
}

/// Keep at most `max_chars` characters, cutting on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_lines("a\nb", 2), "a\nb");
        assert_eq!(truncate_lines("", 0), "");
    }

    #[test]
    fn long_text_gets_marker() {
        let text = (1..=60).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let cut = truncate_lines(&text, 50);
        assert!(cut.starts_with("1\n2\n"));
        assert!(cut.contains("\n50\n"));
        assert!(!cut.contains("\n51\n"));
        assert!(cut.ends_with("[... 10 more lines truncated ...]"));
    }

    #[test]
    fn chars_cut_on_boundary() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo…");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
