//! UTF-8 safe truncation for evidence text sent to the analyzer.

/// Shorten `content` to roughly `max_bytes`, keeping its head and tail.
///
/// The cut points always land on character boundaries. The omitted middle is
/// replaced by a marker stating how many bytes were dropped.
pub fn truncate_middle(content: &str, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content.to_string();
    }
    if max_bytes == 0 {
        return format!("[... {} bytes omitted ...]", content.len());
    }

    let half = max_bytes / 2;
    let head_end = floor_boundary(content, half);
    let tail_start = ceil_boundary(content, content.len() - half).max(head_end);

    let omitted = tail_start - head_end;
    format!(
        "{}\n[... {} bytes omitted ...]\n{}",
        &content[..head_end],
        omitted,
        &content[tail_start..]
    )
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
