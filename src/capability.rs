use std::fmt::Display;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::CapabilityResult;
use crate::textutil::is_none_sentinel;

static SCORE_DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("score regex"));

pub const SCORE_LABEL: &str = "完整性评分";
pub const MISSING_LABEL: &str = "遗漏内容";
pub const SUGGESTIONS_LABEL: &str = "建议";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryRole {
    Original,
    Translated,
}

impl SummaryRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Translated => "translated",
        }
    }
}

/// Reviewer verdict on two summaries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Comparison {
    /// 0..=10.
    pub completeness_score: u8,
    pub missing_content: String,
    pub suggestions: String,
    pub raw_result: String,
}

impl Comparison {
    /// Parse the line-oriented verdict:
    ///
    /// ```text
    /// - 完整性评分：7
    /// - 遗漏内容：...
    /// - 建议：...
    /// ```
    ///
    /// Full-width and ASCII colons are both accepted. A missing or unreadable score is zero.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut out = Self {
            raw_result: raw.to_string(),
            ..Self::default()
        };
        for line in raw.lines() {
            let line =
                line.trim_start_matches(|c: char| c == '-' || c == '*' || c.is_whitespace());
            if let Some(rest) = field_value(line, SCORE_LABEL) {
                if let Some(m) = SCORE_DIGITS_RE.find(rest) {
                    out.completeness_score = m.as_str().parse::<u32>().unwrap_or(0).min(10) as u8;
                }
            } else if let Some(rest) = field_value(line, MISSING_LABEL) {
                out.missing_content = rest.trim().to_string();
            } else if let Some(rest) = field_value(line, SUGGESTIONS_LABEL) {
                out.suggestions = rest.trim().to_string();
            }
        }
        out
    }

    /// Verdict used when the comparison call itself failed.
    pub fn failed(err: impl Display) -> Self {
        let note = format!("比较失败: {err}");
        Self {
            completeness_score: 0,
            missing_content: note.clone(),
            suggestions: String::new(),
            raw_result: note,
        }
    }

    /// Non-empty and not the "nothing missing" sentinel.
    #[must_use]
    pub fn has_missing(&self) -> bool {
        !is_none_sentinel(&self.missing_content)
    }
}

/// Value after `label` and its colon. Markdown bold markers around either side are ignored.
fn field_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(label)?.trim_start_matches('*');
    let value = rest.strip_prefix('：').or_else(|| rest.strip_prefix(':'))?;
    Some(value.trim_start().trim_start_matches('*'))
}

/// What the translation pipeline needs from a language model.
///
/// Every method is fallible; the pipeline keeps prior content for the unit that failed.
pub trait TranslationCapability {
    fn translate(&self, text: &str) -> CapabilityResult<String>;

    fn summarize(&self, text: &str, role: SummaryRole) -> CapabilityResult<String>;

    fn compare(&self, original_summary: &str, translated_summary: &str)
        -> CapabilityResult<Comparison>;

    /// Free-form instruction: focused retranslation, keyword extraction, segment repair.
    fn complete(&self, prompt: &str) -> CapabilityResult<String>;
}

impl<T: TranslationCapability + ?Sized> TranslationCapability for Box<T> {
    fn translate(&self, text: &str) -> CapabilityResult<String> {
        (**self).translate(text)
    }

    fn summarize(&self, text: &str, role: SummaryRole) -> CapabilityResult<String> {
        (**self).summarize(text, role)
    }

    fn compare(
        &self,
        original_summary: &str,
        translated_summary: &str,
    ) -> CapabilityResult<Comparison> {
        (**self).compare(original_summary, translated_summary)
    }

    fn complete(&self, prompt: &str) -> CapabilityResult<String> {
        (**self).complete(prompt)
    }
}

/// Model-free stand-in for `--dry-run`: text passes through unchanged and every comparison is
/// a perfect score, so the document structure can be checked without a backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoCapability;

impl TranslationCapability for EchoCapability {
    fn translate(&self, text: &str) -> CapabilityResult<String> {
        Ok(text.to_string())
    }

    fn summarize(&self, text: &str, _role: SummaryRole) -> CapabilityResult<String> {
        Ok(text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim().to_string())
    }

    fn compare(&self, _a: &str, _b: &str) -> CapabilityResult<Comparison> {
        Ok(Comparison {
            completeness_score: 10,
            missing_content: "无".to_string(),
            suggestions: "无".to_string(),
            raw_result: String::new(),
        })
    }

    fn complete(&self, _prompt: &str) -> CapabilityResult<String> {
        Ok(String::new())
    }
}

/// Strip code fences a model wraps around its answer.
#[must_use]
pub fn cleanup_model_text(text: &str) -> String {
    let mut s = text.trim().to_string();
    if s.starts_with("```") {
        if let Some(i) = s.find('\n') {
            s = s[i + 1..].to_string();
        }
        if let Some(end) = s.rfind("```") {
            s = s[..end].to_string();
        }
    }
    s.trim().to_string()
}
