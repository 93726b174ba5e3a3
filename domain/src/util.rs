//! Small shared helpers

/// Truncate a string to `max_chars`, appending an ellipsis when cut.
///
/// Used for log lines and previews; never for wire payloads.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
