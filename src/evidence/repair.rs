//! Textual repairs for almost-JSON produced by the analyzer.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BLOCK_COMMENT: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
    static ref PAREN_ASIDE: Regex = Regex::new(r"\([^()\n]*\)").unwrap();
    static ref TRAILING_COMMA: Regex = Regex::new(r",(\s*[}\]])").unwrap();
    static ref CODE_FENCE: Regex = Regex::new(r"(?m)^\s*```[A-Za-z]*\s*$").unwrap();
}

const PROSE_MARKERS: [&str; 7] = ["*", "-", "#", "Note:", "Explanation:", "Here", "This"];

/// Remove markdown code fence lines, keeping what they wrapped.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Remove fragments the analyzer uses as commentary and retry-able syntax
/// slips: comments, parenthetical asides, prose lines, trailing commas and
/// unquoted keys.
pub fn repair_json(fragment: &str) -> String {
    let text = strip_code_fences(fragment);
    let text = BLOCK_COMMENT.replace_all(&text, "");
    let text = strip_line_comments(&text);
    let text = PAREN_ASIDE.replace_all(&text, "");

    let kept: Vec<&str> = text.lines().filter(|line| !looks_like_prose(line)).collect();
    let text = kept.join("\n");

    let text = TRAILING_COMMA.replace_all(&text, "$1");
    quote_bare_keys(&text)
}

/// Wrap `key:` in quotes when the key follows `{` or `,` outside a string.
fn quote_bare_keys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut expect_key = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }

        if expect_key && c.is_ascii_alphabetic() {
            let start = i;
            let mut end = i;
            while end < chars.len() && (chars[end].is_alphanumeric() || "_- ".contains(chars[end])) {
                end += 1;
            }
            if end < chars.len() && chars[end] == ':' {
                let key: String = chars[start..end].iter().collect();
                out.push('"');
                out.push_str(key.trim_end());
                out.push('"');
                i = end;
                expect_key = false;
                continue;
            }
        }

        match c {
            '"' => {
                in_string = true;
                expect_key = false;
            }
            '{' | ',' => expect_key = true,
            _ if c.is_whitespace() => {}
            _ => expect_key = false,
        }
        out.push(c);
        i += 1;
    }
    out
}

/// `//` comments, but not the `//` inside a quoted string such as a URL.
fn strip_line_comments(text: &str) -> String {
    text.lines()
        .map(|line| match comment_start(line) {
            Some(idx) => &line[..idx],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn comment_start(line: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        match b {
            _ if escaped => escaped = false,
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'/' if !in_string && bytes.get(i + 1) == Some(&b'/') => return Some(i),
            _ => {}
        }
    }
    None
}

/// A line that carries no structured data: it opens with a list/heading
/// marker, or it is free prose with neither a key separator nor a quote.
pub fn looks_like_prose(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.starts_with('"') || trimmed.starts_with('{') || trimmed.starts_with('[') {
        return false;
    }
    if trimmed.starts_with('-') && trimmed[1..].trim_start().starts_with(|c: char| c.is_ascii_digit()) {
        // negative number
        return false;
    }
    if PROSE_MARKERS.iter().any(|m| trimmed.starts_with(m)) {
        return true;
    }
    let structural = trimmed.chars().all(|c| "{}[],: ".contains(c));
    !structural && !trimmed.contains(':') && !trimmed.contains('"') && trimmed.chars().any(|c| c.is_alphabetic())
}
