//! Content-aware truncation for structured-extraction input.
//!
//! Model context is the scarce resource and profile pages are mostly
//! boilerplate. The budget is enforced strictly: output never exceeds
//! it, marker included.

/// Lines containing any of these are boilerplate and dropped.
const SKIP_PATTERNS: [&str; 15] = [
    "navigation",
    "menu",
    "copyright",
    "footer",
    "header",
    "privacy policy",
    "terms of use",
    "skip to content",
    "search",
    "social media",
    "follow us",
    "contact us",
    "all rights reserved",
    "©",
    "cookie",
];

/// First sight of one of these starts main-content accumulation.
const MAIN_MARKERS: [&str; 5] = ["biography", "research", "publications", "about", "profile"];

/// Inserted where content was cut.
pub const TRUNCATION_MARKER: &str = "\n...[content truncated]...\n";

/// Reduce `content` to at most `max_chars` characters.
///
/// Content already within the budget is returned unchanged. Oversized
/// content is filtered line by line: boilerplate lines are dropped and
/// accumulation starts at the first main-content marker. When no marker
/// appears, the middle half of the lines stands in, where body text
/// usually lives. A result still over the budget keeps its head and
/// tail around a single [`TRUNCATION_MARKER`], marker counted inside
/// the budget.
pub fn truncate_for_extraction(content: &str, max_chars: usize) -> String {
    if char_len(content) <= max_chars {
        return content.to_string();
    }

    let lines: Vec<&str> = content.lines().collect();
    let mut kept: Vec<&str> = Vec::new();
    let mut in_main = false;
    let mut total = 0usize;

    for line in &lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_lowercase();
        // Marker check comes first: "research" contains "search", and a
        // main-content line is never boilerplate.
        let is_main = MAIN_MARKERS.iter().any(|marker| lower.contains(marker));
        if is_main {
            in_main = true;
        } else if SKIP_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
            continue;
        }
        if in_main {
            kept.push(trimmed);
            total += char_len(trimmed) + 1;
            if total >= max_chars {
                break;
            }
        }
    }

    if kept.is_empty() {
        let quarter = lines.len() / 4;
        let upper = (lines.len() * 3) / 4;
        kept = lines[quarter..upper]
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect();
    }
    if kept.is_empty() {
        // Degenerate markup, e.g. one enormous line.
        kept = lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect();
    }

    let joined = kept.join(" ");
    if char_len(&joined) <= max_chars {
        joined
    } else {
        head_and_tail(&joined, max_chars)
    }
}

/// Keep the head and tail of `text` around the marker, within budget.
fn head_and_tail(text: &str, max_chars: usize) -> String {
    let marker_len = char_len(TRUNCATION_MARKER);
    if max_chars <= marker_len {
        // Budget too small to fit the marker at all; hard cut.
        return take_chars(text, max_chars).to_string();
    }
    let keep = max_chars - marker_len;
    let head = keep / 2;
    let tail = keep - head;
    format!(
        "{}{}{}",
        take_chars(text, head),
        TRUNCATION_MARKER,
        take_last_chars(text, tail)
    )
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// First `n` characters, on char boundaries.
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Last `n` characters, on char boundaries.
fn take_last_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let len = char_len(s);
    if len <= n {
        return s;
    }
    match s.char_indices().nth(len - n) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}
