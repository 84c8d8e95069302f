use serde::Serialize;

use crate::capability::Comparison;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineMode {
    /// Keyword-scored blocks plus neighbours, improved together.
    Targeted,
    /// Every block improved in one pass.
    Full,
    /// Chunks matched against the reported gap, retranslated together.
    Focused,
    /// Leading excerpt of the source retranslated after the focused pass failed.
    Excerpt,
}

impl RefineMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Targeted => "targeted",
            Self::Full => "full",
            Self::Focused => "focused",
            Self::Excerpt => "excerpt",
        }
    }
}

/// Per-document record written beside the output as `{stem}.stats.json`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TranslationStats {
    pub input_file: String,
    pub output_file: String,
    pub file_format: String,
    pub translator_id: String,
    pub original_summary: String,
    pub translated_summary: String,
    pub comparison_result: Comparison,
    /// Chunks (Markdown) or translated blocks (RST).
    pub chunk_count: usize,
    pub completeness_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refine_mode: Option<RefineMode>,
    pub total_blocks: usize,
    pub translatable_blocks: usize,
    pub untranslated_blocks: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub misaligned_titles: Vec<String>,
}

impl TranslationStats {
    pub fn set_comparison(&mut self, comparison: Comparison) {
        self.completeness_score = comparison.completeness_score;
        self.comparison_result = comparison;
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
