use once_cell::sync::Lazy;
use regex::Regex;

use super::block::{BlockAttrs, BlockKind, DocumentBlock};
use super::metadata::Metadata;
use super::{DocumentFormat, FormatProcessor};
use crate::textutil::leading_whitespace;

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("heading regex"));
static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```(\w*)$").expect("fence regex"));
static LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)([-*+]|\d+\.)\s+(.+)$").expect("list regex"));
static QUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^>\s*(.*)$").expect("quote regex"));
static HR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\*{3,}|-{3,}|_{3,})$").expect("hr regex"));
static FRONT_MATTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\n(.*?)\n---").expect("front matter regex"));

#[derive(Default)]
struct FenceState {
    open: bool,
    language: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownProcessor;

impl MarkdownProcessor {
    pub fn new() -> Self {
        Self
    }

    fn classify(line: &str, fence: &mut FenceState) -> DocumentBlock {
        let stripped = line.trim();

        if let Some(caps) = FENCE_RE.captures(stripped) {
            if fence.open {
                let language = fence.language.take();
                fence.open = false;
                return DocumentBlock::new(BlockKind::CodeFenceEnd, line).with_attrs(BlockAttrs {
                    language,
                    ..BlockAttrs::default()
                });
            }
            let language = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty());
            fence.open = true;
            fence.language = language.clone();
            return DocumentBlock::new(BlockKind::CodeFenceStart, line).with_attrs(BlockAttrs {
                language,
                ..BlockAttrs::default()
            });
        }

        if fence.open {
            return DocumentBlock::new(BlockKind::Code, line);
        }

        if let Some(caps) = HEADING_RE.captures(line) {
            let hashes = caps[1].to_string();
            return DocumentBlock::new(BlockKind::Heading, line).with_attrs(BlockAttrs {
                level: Some(hashes.len() as u8),
                hashes: Some(hashes),
                inner_text: Some(caps[2].to_string()),
                ..BlockAttrs::default()
            });
        }

        if HR_RE.is_match(stripped) {
            return DocumentBlock::new(BlockKind::HorizontalRule, line);
        }

        if let Some(caps) = LIST_RE.captures(line) {
            return DocumentBlock::new(BlockKind::ListItem, line).with_attrs(BlockAttrs {
                indent: Some(caps[1].to_string()),
                marker: Some(caps[2].to_string()),
                inner_text: Some(caps[3].to_string()),
                ..BlockAttrs::default()
            });
        }

        if let Some(caps) = QUOTE_RE.captures(line) {
            return DocumentBlock::new(BlockKind::Blockquote, line).with_attrs(BlockAttrs {
                inner_text: Some(caps[1].trim_end().to_string()),
                ..BlockAttrs::default()
            });
        }

        if stripped.is_empty() {
            return DocumentBlock::new(BlockKind::Blank, line);
        }

        DocumentBlock::new(BlockKind::Paragraph, line).with_attrs(BlockAttrs {
            indent: Some(leading_whitespace(line).to_string()),
            inner_text: Some(stripped.to_string()),
            ..BlockAttrs::default()
        })
    }

    fn render(block: &DocumentBlock) -> String {
        if !block.is_replaced() {
            return block.raw_text.clone();
        }
        let text = block.raw_text.as_str();
        let a = &block.attrs;
        match block.kind {
            BlockKind::Heading => {
                if text.starts_with('#') {
                    return text.to_string();
                }
                let hashes = a.hashes.as_deref().unwrap_or("#");
                format!("{hashes} {text}")
            }
            BlockKind::ListItem => {
                let indent = a.indent.as_deref().unwrap_or("");
                let marker = a.marker.as_deref().unwrap_or("-");
                format!("{indent}{marker} {text}")
            }
            BlockKind::Blockquote => format!("> {text}"),
            BlockKind::Paragraph => {
                format!("{}{text}", a.indent.as_deref().unwrap_or(""))
            }
            _ => text.to_string(),
        }
    }
}

impl FormatProcessor for MarkdownProcessor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Markdown
    }

    fn parse(&self, text: &str) -> Vec<DocumentBlock> {
        let mut fence = FenceState::default();
        text.split('\n')
            .map(|line| Self::classify(line, &mut fence))
            .collect()
    }

    fn reconstruct(&self, blocks: &[DocumentBlock]) -> String {
        blocks.iter().map(Self::render).collect::<Vec<_>>().join("\n")
    }

    /// Front matter is a `---` fence at the very top (leading whitespace ignored). Missing keys
    /// are filled with defaults; the remaining body is trimmed.
    fn extract_metadata(&self, text: &str) -> (Option<Metadata>, String) {
        let stripped = text.trim();
        let Some(caps) = FRONT_MATTER_RE.captures(stripped) else {
            return (None, text.to_string());
        };
        let mut meta = Metadata::with_defaults();
        for line in caps[1].split('\n') {
            let line = line.trim();
            if let Some((key, value)) = line.split_once(':') {
                meta.set(key.trim(), value.trim());
            }
        }
        let end = caps.get(0).map_or(0, |m| m.end());
        (Some(meta), stripped[end..].trim().to_string())
    }

    fn format_with_metadata(&self, metadata: Option<&Metadata>, text: &str) -> String {
        let Some(meta) = metadata.filter(|m| !m.is_empty()) else {
            return text.to_string();
        };
        let lines: Vec<String> = meta
            .fields()
            .into_iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        format!("---\n{}\n---\n\n{text}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(blocks: &[DocumentBlock]) -> Vec<BlockKind> {
        blocks.iter().map(|b| b.kind).collect()
    }

    #[test]
    fn classifies_common_constructs() {
        let doc = "# Title\n\nIntro text.\n- item one\n  2. nested\n> quoted\n***\n```rust\nfn main() {}\n# not a heading\n```\nTail";
        let blocks = MarkdownProcessor::new().parse(doc);
        assert_eq!(
            kinds(&blocks),
            vec![
                BlockKind::Heading,
                BlockKind::Blank,
                BlockKind::Paragraph,
                BlockKind::ListItem,
                BlockKind::ListItem,
                BlockKind::Blockquote,
                BlockKind::HorizontalRule,
                BlockKind::CodeFenceStart,
                BlockKind::Code,
                BlockKind::Code,
                BlockKind::CodeFenceEnd,
                BlockKind::Paragraph,
            ]
        );
        assert_eq!(blocks[7].attrs.language.as_deref(), Some("rust"));
        assert_eq!(blocks[4].attrs.indent.as_deref(), Some("  "));
        assert_eq!(blocks[4].attrs.marker.as_deref(), Some("2."));
    }

    #[test]
    fn heading_level_counts_hashes() {
        let p = MarkdownProcessor::new();
        let blocks = p.parse("###### deep\n####### too deep");
        assert_eq!(blocks[0].attrs.level, Some(6));
        assert_eq!(blocks[1].kind, BlockKind::Paragraph);
    }

    #[test]
    fn replaced_blocks_are_rewrapped() {
        let p = MarkdownProcessor::new();
        let mut blocks = p.parse("## Setup\n  * Install it\n> Note this\n   Indented para");
        blocks[0].replace_text("安装");
        blocks[1].replace_text("安装它");
        blocks[2].replace_text("注意");
        blocks[3].replace_text("缩进段落");
        assert_eq!(
            p.reconstruct(&blocks),
            "## 安装\n  * 安装它\n> 注意\n   缩进段落"
        );
    }

    #[test]
    fn translatable_text_uses_inner_portions() {
        let p = MarkdownProcessor::new();
        let blocks = p.parse("# Title\n\n- one\n>\n> two\n```\ncode\n```\n  para  ");
        assert_eq!(p.extract_translatable(&blocks), "Title\none\ntwo\npara");
    }

    #[test]
    fn front_matter_round() {
        let p = MarkdownProcessor::new();
        let (meta, body) = p.extract_metadata("---\ntitle: X\nauthor: Y\n---\nBody");
        let meta = meta.expect("front matter");
        assert_eq!(body, "Body");
        assert_eq!(meta.title.as_deref(), Some("X"));
        assert_eq!(meta.author.as_deref(), Some("Y"));
        assert_eq!(meta.status.as_deref(), Some("translating"));

        let out = p.format_with_metadata(Some(&meta), &body);
        assert!(out.starts_with("---\nstatus: translating\ntitle: X\nauthor: Y\n"));
        assert!(out.ends_with("\n---\n\nBody"));
        assert_eq!(out.lines().filter(|l| l.contains(": ")).count(), 8);
    }

    #[test]
    fn no_front_matter_is_absent() {
        let p = MarkdownProcessor::new();
        let (meta, body) = p.extract_metadata("# Doc\n---\n");
        assert!(meta.is_none());
        assert_eq!(body, "# Doc\n---\n");
        assert_eq!(p.format_with_metadata(None, "x"), "x");
        assert_eq!(p.format_with_metadata(Some(&Metadata::default()), "x"), "x");
    }
}
