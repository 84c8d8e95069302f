use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Title,
    TitleOverline,
    TitleUnderline,
    Heading,
    Paragraph,
    Code,
    CodeFenceStart,
    CodeFenceEnd,
    Directive,
    DirectiveContent,
    ListItem,
    Blockquote,
    TableSeparator,
    HorizontalRule,
    Blank,
}

impl BlockKind {
    #[must_use]
    pub fn is_translatable(self) -> bool {
        matches!(
            self,
            Self::Title | Self::Heading | Self::Paragraph | Self::ListItem | Self::Blockquote
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::TitleOverline => "title_overline",
            Self::TitleUnderline => "title_underline",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::Code => "code",
            Self::CodeFenceStart => "code_fence_start",
            Self::CodeFenceEnd => "code_fence_end",
            Self::Directive => "directive",
            Self::DirectiveContent => "directive_content",
            Self::ListItem => "list_item",
            Self::Blockquote => "blockquote",
            Self::TableSeparator => "table_separator",
            Self::HorizontalRule => "horizontal_rule",
            Self::Blank => "blank",
        }
    }
}

/// Facts captured at parse time so a replaced block can be re-wrapped without looking at the
/// translated text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BlockAttrs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashes: Option<String>,
    /// RST rule character shared by overline/underline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_char: Option<char>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub overline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    /// Text without markup: heading title, list item body, quote body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentBlock {
    pub kind: BlockKind,
    pub raw_text: String,
    pub is_translatable: bool,
    pub attrs: BlockAttrs,
    #[serde(skip)]
    replaced: bool,
}

impl DocumentBlock {
    pub fn new(kind: BlockKind, raw_text: impl Into<String>) -> Self {
        Self {
            kind,
            raw_text: raw_text.into(),
            is_translatable: kind.is_translatable(),
            attrs: BlockAttrs::default(),
            replaced: false,
        }
    }

    #[must_use]
    pub fn with_attrs(mut self, attrs: BlockAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Text handed to the translator. Before replacement this is the markup-free portion of the
    /// line; afterwards it is the stored translation.
    #[must_use]
    pub fn inner_text(&self) -> &str {
        if self.replaced {
            return &self.raw_text;
        }
        match self.attrs.inner_text.as_deref() {
            Some(t) => t,
            None => self.raw_text.trim(),
        }
    }

    #[must_use]
    pub fn has_text(&self) -> bool {
        self.is_translatable && !self.inner_text().trim().is_empty()
    }

    /// Swap in translated inner text. Attributes stay untouched so reconstruction can re-add
    /// markers, indentation and rules.
    pub fn replace_text(&mut self, text: impl Into<String>) {
        self.raw_text = text.into();
        self.replaced = true;
    }

    #[must_use]
    pub fn is_replaced(&self) -> bool {
        self.replaced
    }
}

#[must_use]
pub fn translatable_indices(blocks: &[DocumentBlock]) -> Vec<usize> {
    blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.has_text())
        .map(|(i, _)| i)
        .collect()
}
