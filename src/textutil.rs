/// Monospace width used for RST rules: code points above 127 count as two columns.
#[must_use]
pub fn display_width(text: &str) -> usize {
    text.chars().map(|c| if (c as u32) > 127 { 2 } else { 1 }).sum()
}

#[must_use]
pub fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

/// Indentation in characters; blank lines report zero.
#[must_use]
pub fn indent_width(line: &str) -> usize {
    if line.trim().is_empty() {
        return 0;
    }
    leading_whitespace(line).chars().count()
}

/// Paragraphs separated by blank lines, trimmed, empties dropped.
pub fn split_blank_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn split_nonempty_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reviewer sentinel for "nothing missing".
#[must_use]
pub fn is_none_sentinel(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || t == "无" || t.eq_ignore_ascii_case("none")
}

/// First `max_chars` characters with an ellipsis marker, for log lines.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut out: String = flat.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[must_use]
pub fn today_stamp() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}
