pub mod block;
pub mod markdown;
pub mod metadata;
pub mod registry;
pub mod rst;

use serde::Serialize;

pub use block::{translatable_indices, BlockAttrs, BlockKind, DocumentBlock};
pub use markdown::MarkdownProcessor;
pub use metadata::Metadata;
pub use registry::ProcessorRegistry;
pub use rst::RstProcessor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Markdown,
    Rst,
}

/// Contract shared by every document format.
///
/// Processors hold no scan state between calls: one instance can parse any number of documents.
pub trait FormatProcessor {
    fn format(&self) -> DocumentFormat;

    /// One block per input line, in order. Never fails; unknown lines become paragraphs.
    fn parse(&self, text: &str) -> Vec<DocumentBlock>;

    /// Joins rendered blocks with `\n`. Unmodified blocks reproduce the parsed text exactly.
    fn reconstruct(&self, blocks: &[DocumentBlock]) -> String;

    fn extract_translatable(&self, blocks: &[DocumentBlock]) -> String {
        blocks
            .iter()
            .filter(|b| b.has_text())
            .map(DocumentBlock::inner_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn extract_metadata(&self, text: &str) -> (Option<Metadata>, String);

    /// Prepends the serialized header. Absent or empty metadata returns `text` unchanged.
    fn format_with_metadata(&self, metadata: Option<&Metadata>, text: &str) -> String;
}

#[derive(Clone, Copy, Debug)]
pub enum Processor {
    Markdown(MarkdownProcessor),
    Rst(RstProcessor),
}

impl Processor {
    fn inner(&self) -> &dyn FormatProcessor {
        match self {
            Self::Markdown(p) => p,
            Self::Rst(p) => p,
        }
    }

    /// Overline titles whose translated text outgrew the preserved rule (RST only).
    #[must_use]
    pub fn misaligned_titles(&self, blocks: &[DocumentBlock]) -> Vec<String> {
        match self {
            Self::Markdown(_) => Vec::new(),
            Self::Rst(_) => RstProcessor::misaligned_titles(blocks),
        }
    }
}

impl FormatProcessor for Processor {
    fn format(&self) -> DocumentFormat {
        self.inner().format()
    }

    fn parse(&self, text: &str) -> Vec<DocumentBlock> {
        self.inner().parse(text)
    }

    fn reconstruct(&self, blocks: &[DocumentBlock]) -> String {
        self.inner().reconstruct(blocks)
    }

    fn extract_translatable(&self, blocks: &[DocumentBlock]) -> String {
        self.inner().extract_translatable(blocks)
    }

    fn extract_metadata(&self, text: &str) -> (Option<Metadata>, String) {
        self.inner().extract_metadata(text)
    }

    fn format_with_metadata(&self, metadata: Option<&Metadata>, text: &str) -> String {
        self.inner().format_with_metadata(metadata, text)
    }
}
