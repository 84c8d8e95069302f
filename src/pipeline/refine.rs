use once_cell::sync::Lazy;
use regex::Regex;

use crate::capability::{Comparison, SummaryRole, TranslationCapability};
use crate::document::{translatable_indices, DocumentBlock};
use crate::error::LtError;
use crate::pipeline::prompts::SEGMENT_DELIMITER;
use crate::progress::ConsoleProgress;
use crate::textutil::{split_blank_paragraphs, split_nonempty_lines};

static SEG_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[SEG-\d+\]\s*").expect("seg label regex"));
static ASCII_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9_\-]+").expect("ascii word regex"));

pub const DEFAULT_REFINE_THRESHOLD: u8 = 8;
pub const DEFAULT_MAX_TARGETS: usize = 5;
/// Chunks retranslated when nothing matches the reported gap.
pub const FALLBACK_FOCUS_CHUNKS: usize = 3;
/// Upper bound of the excerpt used by the last-resort retranslation.
pub const EXCERPT_MAX_CHARS: usize = 1000;
const GAP_KEYWORDS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefineSettings {
    pub threshold: u8,
    pub enabled: bool,
    pub max_targets: usize,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_REFINE_THRESHOLD,
            enabled: true,
            max_targets: DEFAULT_MAX_TARGETS,
        }
    }
}

impl RefineSettings {
    /// Score below threshold, or the reviewer named something missing.
    #[must_use]
    pub fn should_refine(&self, cmp: &Comparison) -> bool {
        self.enabled && (cmp.completeness_score < self.threshold || cmp.has_missing())
    }
}

pub fn summarize_or_note(
    cap: &dyn TranslationCapability,
    text: &str,
    role: SummaryRole,
    progress: &ConsoleProgress,
) -> String {
    match cap.summarize(text, role) {
        Ok(s) => s,
        Err(e) => {
            progress.warn(format!("{} summary failed: {e}", role.as_str()));
            format!("摘要生成失败: {e}")
        }
    }
}

pub fn compare_or_failed(
    cap: &dyn TranslationCapability,
    original_summary: &str,
    translated_summary: &str,
    progress: &ConsoleProgress,
) -> Comparison {
    match cap.compare(original_summary, translated_summary) {
        Ok(c) => c,
        Err(e) => {
            progress.warn(format!("summary comparison failed: {e}"));
            Comparison::failed(e)
        }
    }
}

/// The first five whitespace tokens of the gap description, keeping those longer than two chars.
pub fn gap_keywords(missing: &str) -> Vec<String> {
    missing
        .split_whitespace()
        .take(GAP_KEYWORDS)
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Indices of texts that contain the whole gap description or any gap keyword
/// (case-insensitive). Falls back to the first three; the result is widened by one on each side.
pub fn focus_indices(texts: &[&str], missing: &str) -> Vec<usize> {
    let missing_lower = missing.trim().to_lowercase();
    let keywords: Vec<String> = gap_keywords(missing)
        .iter()
        .map(|k| k.to_lowercase())
        .collect();
    let mut hits: Vec<usize> = texts
        .iter()
        .enumerate()
        .filter(|(_, t)| {
            let lower = t.to_lowercase();
            (!missing_lower.is_empty() && lower.contains(&missing_lower))
                || keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .map(|(i, _)| i)
        .collect();
    if hits.is_empty() {
        hits = (0..texts.len().min(FALLBACK_FOCUS_CHUNKS)).collect();
    }
    widen(&hits, texts.len(), |_| true)
}

/// Each index plus its immediate neighbours that pass `keep`, sorted and deduplicated.
pub fn widen(primary: &[usize], len: usize, keep: impl Fn(usize) -> bool) -> Vec<usize> {
    let mut out: Vec<usize> = Vec::new();
    for &i in primary {
        let lo = i.saturating_sub(1);
        let hi = (i + 1).min(len.saturating_sub(1));
        for j in lo..=hi {
            if j < len && keep(j) {
                out.push(j);
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

/// Keywords from a reverse-extraction answer: comma separated, ASCII or full-width commas.
pub fn parse_keyword_list(raw: &str) -> Vec<String> {
    raw.split([',', '，', '\n'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Alphanumeric words of the gap description, used when reverse extraction fails.
pub fn fallback_keywords(missing: &str) -> Vec<String> {
    ASCII_WORD_RE
        .find_iter(missing)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Rank texts by keyword hits and keep the best `max_targets` that hit at least once.
/// Ties keep document order.
pub fn score_targets(texts: &[(usize, &str)], keywords: &[String], max_targets: usize) -> Vec<usize> {
    let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut scored: Vec<(usize, usize)> = texts
        .iter()
        .filter_map(|(idx, text)| {
            let lower = text.to_lowercase();
            let hits = lowered.iter().filter(|k| lower.contains(k.as_str())).count();
            (hits > 0).then_some((*idx, hits))
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.into_iter().take(max_targets).map(|(i, _)| i).collect()
}

pub fn segment_label(n: usize) -> String {
    format!("[SEG-{n}]")
}

/// Split a segmented answer on the delimiter, falling back to blank lines. The flag reports
/// whether the result has exactly `expected` segments. Leading `[SEG-n]` labels are removed.
pub fn split_segments(raw: &str, expected: usize) -> (Vec<String>, bool) {
    let mut parts: Vec<String> = raw
        .split(SEGMENT_DELIMITER)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if parts.len() != expected {
        let fallback = split_blank_paragraphs(raw);
        if fallback.len() == expected || parts.len() <= 1 {
            parts = fallback;
        }
    }
    let exact = parts.len() == expected;
    let parts = parts
        .into_iter()
        .map(|p| SEG_LABEL_RE.replace(&p, "").trim().to_string())
        .collect();
    (parts, exact)
}

pub fn parse_segments(raw: &str, expected: usize) -> Result<Vec<String>, LtError> {
    match split_segments(raw, expected) {
        (parts, true) => Ok(parts),
        (parts, false) => Err(LtError::MalformedOutput {
            expected,
            got: parts.len(),
        }),
    }
}

/// Assign translated paragraphs to translatable blocks by position. Returns the number of
/// translatable blocks left untouched.
pub fn reassign_paragraphs(blocks: &mut [DocumentBlock], translated: &str) -> usize {
    let targets = translatable_indices(blocks);
    let by_blank = split_blank_paragraphs(translated);
    let paragraphs = if by_blank.len() == targets.len() {
        by_blank
    } else {
        let by_line = split_nonempty_lines(translated);
        if by_line.len() == targets.len() || !translated.contains("\n\n") {
            by_line
        } else {
            by_blank
        }
    };

    let mut untouched = 0;
    for (pos, &bi) in targets.iter().enumerate() {
        match paragraphs.get(pos) {
            Some(p) if p.as_str() != blocks[bi].inner_text().trim() => blocks[bi].replace_text(p),
            _ => untouched += 1,
        }
    }
    untouched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FormatProcessor, MarkdownProcessor};

    fn cmp(score: u8, missing: &str) -> Comparison {
        Comparison {
            completeness_score: score,
            missing_content: missing.to_string(),
            ..Comparison::default()
        }
    }

    #[test]
    fn refinement_trigger() {
        let s = RefineSettings::default();
        assert!(s.should_refine(&cmp(6, "无")));
        assert!(s.should_refine(&cmp(9, "supply chain")));
        assert!(!s.should_refine(&cmp(8, "无")));
        assert!(!s.should_refine(&cmp(10, "  ")));
        let off = RefineSettings {
            enabled: false,
            ..s
        };
        assert!(!off.should_refine(&cmp(0, "everything")));
    }

    #[test]
    fn gap_keywords_take_five_then_filter() {
        assert_eq!(
            gap_keywords("supply chain attestation"),
            vec!["supply", "chain", "attestation"]
        );
        assert_eq!(gap_keywords("a of the big red dog"), vec!["the", "big", "red"]);
    }

    #[test]
    fn focus_widens_matches_and_falls_back() {
        let texts = ["intro", "about Supply lines", "middle", "end", "tail"];
        assert_eq!(focus_indices(&texts, "supply chain attestation"), vec![0, 1, 2]);
        assert_eq!(focus_indices(&texts, "nothing here"), vec![0, 1, 2, 3]);
        assert!(focus_indices(&[], "x").is_empty());
    }

    #[test]
    fn widen_respects_filter_and_bounds() {
        assert_eq!(widen(&[0, 4], 5, |_| true), vec![0, 1, 3, 4]);
        assert_eq!(widen(&[2], 5, |j| j != 1), vec![2, 3]);
    }

    #[test]
    fn keyword_sources() {
        assert_eq!(parse_keyword_list("SBOM， attestation,  ,sigstore"), vec![
            "SBOM",
            "attestation",
            "sigstore"
        ]);
        assert_eq!(fallback_keywords("缺少 in-toto 和 SLSA v1 说明"), vec!["in-toto", "SLSA", "v1"]);
    }

    #[test]
    fn targets_rank_by_hits_stably() {
        let texts = [(1, "alpha beta"), (3, "beta"), (5, "gamma"), (7, "alpha beta gamma")];
        let kws = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        assert_eq!(score_targets(&texts, &kws, 2), vec![7, 1]);
        assert_eq!(score_targets(&texts, &kws, 10), vec![7, 1, 3, 5]);
    }

    #[test]
    fn segments_prefer_delimiter_then_blank_lines() {
        let raw = "[SEG-1] 一\n<<<END>>>\n[SEG-2]\n二\n<<<END>>>";
        assert_eq!(parse_segments(raw, 2).expect("segments"), vec!["一", "二"]);
        assert_eq!(parse_segments("甲\n\n乙", 2).expect("segments"), vec!["甲", "乙"]);
        assert!(matches!(
            parse_segments("only one", 2),
            Err(LtError::MalformedOutput { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn reassignment_uses_lines_when_counts_match() {
        let p = MarkdownProcessor::new();
        let mut blocks = p.parse("# Title\n\nHello world.\n- item");
        let untouched = reassign_paragraphs(&mut blocks, "标题\n你好世界。\n\n条目");
        assert_eq!(untouched, 0);
        assert_eq!(p.reconstruct(&blocks), "# 标题\n\n你好世界。\n- 条目");
    }

    #[test]
    fn short_translation_leaves_tail_untranslated() {
        let p = MarkdownProcessor::new();
        let mut blocks = p.parse("one\n\ntwo\n\nthree");
        let untouched = reassign_paragraphs(&mut blocks, "一\n\n二");
        assert_eq!(untouched, 1);
        assert_eq!(p.reconstruct(&blocks), "一\n\n二\n\nthree");
    }

    #[test]
    fn identical_text_is_not_replaced() {
        let p = MarkdownProcessor::new();
        let source = "  * keep   \nplain";
        let mut blocks = p.parse(source);
        let untouched = reassign_paragraphs(&mut blocks, "keep\nplain");
        assert_eq!(untouched, 2);
        assert_eq!(p.reconstruct(&blocks), source);
    }
}
