use once_cell::sync::Lazy;
use regex::Regex;

use super::block::{BlockAttrs, BlockKind, DocumentBlock};
use super::metadata::Metadata;
use super::{DocumentFormat, FormatProcessor};
use crate::textutil::{display_width, indent_width, leading_whitespace};

pub const RULE_CHARS: &str = "=-~`:'\"^_*+#<>";

/// Blank lines a directive body may span before its indented content resumes.
const DIRECTIVE_LOOKAHEAD: usize = 4;

static DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\.\.\s+(?:\|[^|]+\|\s+)?[\w:-]+::|^\.\.\s+_[^:]*:").expect("directive regex")
});
static CODE_INDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?: {4,}|\t+)").expect("code indent regex"));
static LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)([-*+]|\d+\.|\w+\))\s+(.+)$").expect("list regex"));
static FIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:(\w+):\s*(.+)$").expect("field regex"));

#[must_use]
pub fn title_level(rule: char) -> u8 {
    match rule {
        '=' => 1,
        '-' => 2,
        '~' => 3,
        '`' => 4,
        ':' => 5,
        _ => 6,
    }
}

/// The repeated character when `line` is a section rule (two or more of one rule char).
#[must_use]
pub fn rule_char(line: &str) -> Option<char> {
    let stripped = line.trim();
    let mut chars = stripped.chars();
    let first = chars.next()?;
    if stripped.chars().count() < 2 || !RULE_CHARS.contains(first) {
        return None;
    }
    chars.all(|c| c == first).then_some(first)
}

fn is_table_separator(line: &str) -> bool {
    let stripped = line.trim();
    !stripped.is_empty()
        && stripped.chars().all(|c| "=- +".contains(c))
        && stripped.chars().any(|c| c == '=' || c == '-')
}

#[derive(Default)]
struct ScanState {
    directive_indent: Option<usize>,
    in_literal: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RstProcessor;

impl RstProcessor {
    pub fn new() -> Self {
        Self
    }

    fn title_attrs(rule: char, line: &str, overline: bool) -> BlockAttrs {
        BlockAttrs {
            level: Some(title_level(rule)),
            rule_char: Some(rule),
            overline,
            indent: Some(leading_whitespace(line).to_string()),
            inner_text: Some(line.trim().to_string()),
            ..BlockAttrs::default()
        }
    }

    fn rule_attrs(rule: char, overline: bool) -> BlockAttrs {
        BlockAttrs {
            level: Some(title_level(rule)),
            rule_char: Some(rule),
            overline,
            ..BlockAttrs::default()
        }
    }

    /// A blank line stays inside the directive body when indented content follows within a few
    /// lines.
    fn directive_continues(lines: &[&str], from: usize, base: usize) -> bool {
        lines
            .iter()
            .skip(from)
            .take(DIRECTIVE_LOOKAHEAD)
            .find(|l| !l.trim().is_empty())
            .is_some_and(|l| indent_width(l) > base)
    }

    /// Lines inside a directive body or literal block. Returns `None` once the region ends.
    fn region_block(
        lines: &[&str],
        i: usize,
        state: &mut ScanState,
    ) -> Option<DocumentBlock> {
        let line = lines[i];
        let blank = line.trim().is_empty();

        if let Some(base) = state.directive_indent {
            if !blank && indent_width(line) > base {
                return Some(DocumentBlock::new(BlockKind::DirectiveContent, line));
            }
            if blank && Self::directive_continues(lines, i + 1, base) {
                return Some(DocumentBlock::new(BlockKind::Blank, line));
            }
            state.directive_indent = None;
        }

        let after_marker = i > 0 && {
            let prev = lines[i - 1];
            prev.trim_end().ends_with("::") && !DIRECTIVE_RE.is_match(prev.trim_start())
        };
        if (after_marker || state.in_literal) && (blank || CODE_INDENT_RE.is_match(line)) {
            state.in_literal = true;
            return Some(DocumentBlock::new(BlockKind::Code, line));
        }
        state.in_literal = false;
        None
    }

    fn render(blocks: &[DocumentBlock]) -> Vec<String> {
        let mut out = Vec::with_capacity(blocks.len());
        let mut i = 0;
        while i < blocks.len() {
            let block = &blocks[i];
            let text = Self::render_text(block);
            let regenerate = block.kind == BlockKind::Title
                && block.is_replaced()
                && !block.attrs.overline
                && blocks
                    .get(i + 1)
                    .is_some_and(|b| b.kind == BlockKind::TitleUnderline);
            if regenerate {
                let rule = block.attrs.rule_char.unwrap_or('=');
                let width = display_width(&text);
                out.push(text);
                out.push(rule.to_string().repeat(width));
                i += 2;
                continue;
            }
            out.push(text);
            i += 1;
        }
        out
    }

    fn render_text(block: &DocumentBlock) -> String {
        if !block.is_replaced() {
            return block.raw_text.clone();
        }
        let text = block.raw_text.as_str();
        let a = &block.attrs;
        match block.kind {
            BlockKind::ListItem => {
                let indent = a.indent.as_deref().unwrap_or("");
                let marker = a.marker.as_deref().unwrap_or("-");
                format!("{indent}{marker} {text}")
            }
            BlockKind::Title | BlockKind::Paragraph => {
                format!("{}{text}", a.indent.as_deref().unwrap_or(""))
            }
            _ => text.to_string(),
        }
    }

    #[must_use]
    pub fn misaligned_titles(blocks: &[DocumentBlock]) -> Vec<String> {
        blocks
            .windows(2)
            .filter(|w| {
                w[0].kind == BlockKind::Title
                    && w[0].is_replaced()
                    && w[0].attrs.overline
                    && w[1].kind == BlockKind::TitleUnderline
                    && display_width(&Self::render_text(&w[0])) > display_width(&w[1].raw_text)
            })
            .map(|w| w[0].raw_text.clone())
            .collect()
    }
}

impl FormatProcessor for RstProcessor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Rst
    }

    fn parse(&self, text: &str) -> Vec<DocumentBlock> {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut blocks = Vec::with_capacity(lines.len());
        let mut state = ScanState::default();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];

            if let Some(block) = Self::region_block(&lines, i, &mut state) {
                blocks.push(block);
                i += 1;
                continue;
            }

            // overline + title + underline
            if i + 2 < lines.len() {
                if let (Some(over), None, Some(under)) = (
                    rule_char(line),
                    rule_char(lines[i + 1]),
                    rule_char(lines[i + 2]),
                ) {
                    if over == under && !lines[i + 1].trim().is_empty() {
                        blocks.push(
                            DocumentBlock::new(BlockKind::TitleOverline, line)
                                .with_attrs(Self::rule_attrs(over, true)),
                        );
                        blocks.push(
                            DocumentBlock::new(BlockKind::Title, lines[i + 1])
                                .with_attrs(Self::title_attrs(over, lines[i + 1], true)),
                        );
                        blocks.push(
                            DocumentBlock::new(BlockKind::TitleUnderline, lines[i + 2])
                                .with_attrs(Self::rule_attrs(over, true)),
                        );
                        i += 3;
                        continue;
                    }
                }
            }

            // title + underline
            if i + 1 < lines.len() && !line.trim().is_empty() && rule_char(line).is_none() {
                if let Some(under) = rule_char(lines[i + 1]) {
                    blocks.push(
                        DocumentBlock::new(BlockKind::Title, line)
                            .with_attrs(Self::title_attrs(under, line, false)),
                    );
                    blocks.push(
                        DocumentBlock::new(BlockKind::TitleUnderline, lines[i + 1])
                            .with_attrs(Self::rule_attrs(under, false)),
                    );
                    i += 2;
                    continue;
                }
            }

            if DIRECTIVE_RE.is_match(line.trim_start()) {
                state.directive_indent = Some(indent_width(line));
                blocks.push(DocumentBlock::new(BlockKind::Directive, line));
                i += 1;
                continue;
            }

            let block = if is_table_separator(line) {
                DocumentBlock::new(BlockKind::TableSeparator, line)
            } else if let Some(caps) = LIST_RE.captures(line) {
                DocumentBlock::new(BlockKind::ListItem, line).with_attrs(BlockAttrs {
                    indent: Some(caps[1].to_string()),
                    marker: Some(caps[2].to_string()),
                    inner_text: Some(caps[3].to_string()),
                    ..BlockAttrs::default()
                })
            } else if line.trim().is_empty() {
                DocumentBlock::new(BlockKind::Blank, line)
            } else {
                DocumentBlock::new(BlockKind::Paragraph, line).with_attrs(BlockAttrs {
                    indent: Some(leading_whitespace(line).to_string()),
                    inner_text: Some(line.trim().to_string()),
                    ..BlockAttrs::default()
                })
            };
            blocks.push(block);
            i += 1;
        }

        blocks
    }

    /// Pure-underline titles that were replaced get a fresh rule sized to the new display
    /// width. Overline titles keep both rules byte-for-byte.
    fn reconstruct(&self, blocks: &[DocumentBlock]) -> String {
        Self::render(blocks).join("\n")
    }

    /// Leading `:Field: value` lines, blank lines allowed between them. Field names are
    /// lower-cased; the remaining body has its leading whitespace removed.
    fn extract_metadata(&self, text: &str) -> (Option<Metadata>, String) {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut meta = Metadata::default();
        let mut end = 0;
        let mut found = false;
        for (i, line) in lines.iter().enumerate() {
            let stripped = line.trim();
            if let Some(caps) = FIELD_RE.captures(stripped) {
                meta.set(&caps[1], caps[2].trim());
                end = i + 1;
                found = true;
            } else if !stripped.is_empty() {
                break;
            }
        }
        if !found {
            return (None, text.to_string());
        }
        let body = lines[end..].join("\n");
        (Some(meta), body.trim_start().to_string())
    }

    fn format_with_metadata(&self, metadata: Option<&Metadata>, text: &str) -> String {
        let Some(meta) = metadata.filter(|m| !m.is_empty()) else {
            return text.to_string();
        };
        let lines: Vec<String> = meta
            .fields()
            .into_iter()
            .map(|(k, v)| format!(":{}: {v}", capitalize(k)))
            .collect();
        format!("{}\n\n{text}", lines.join("\n"))
    }
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
